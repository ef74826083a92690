//! Static achievement catalog.

use serde::{Deserialize, Serialize};

use crate::progress::UserProgress;

/// Progress metric an achievement is measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    QuizzesCompleted,
    CountriesLearned,
    CurrentStreak,
    Level,
}

impl Metric {
    /// Read this metric from a progress snapshot.
    pub fn value(&self, progress: &UserProgress) -> u64 {
        match self {
            Metric::QuizzesCompleted => u64::from(progress.quizzes_completed),
            Metric::CountriesLearned => u64::from(progress.countries_learned),
            Metric::CurrentStreak => u64::from(progress.current_streak),
            Metric::Level => u64::from(progress.level),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::QuizzesCompleted => "quizzes completed",
            Metric::CountriesLearned => "countries learned",
            Metric::CurrentStreak => "day streak",
            Metric::Level => "level",
        }
    }
}

/// One catalog entry: unlocks `id` when `metric` reaches `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AchievementRule {
    pub id: &'static str,
    pub title: &'static str,
    pub metric: Metric,
    pub threshold: u64,
}

impl AchievementRule {
    const fn new(id: &'static str, title: &'static str, metric: Metric, threshold: u64) -> Self {
        Self {
            id,
            title,
            metric,
            threshold,
        }
    }

    /// True when the metric moved from below the threshold to at or above it.
    pub fn is_crossed(&self, before: &UserProgress, after: &UserProgress) -> bool {
        self.metric.value(after) >= self.threshold && self.metric.value(before) < self.threshold
    }

    /// True when the snapshot is at or above the threshold.
    pub fn is_satisfied(&self, progress: &UserProgress) -> bool {
        self.metric.value(progress) >= self.threshold
    }
}

/// The full catalog, in evaluation order.
pub const CATALOG: &[AchievementRule] = &[
    AchievementRule::new("first_quiz", "First Quiz", Metric::QuizzesCompleted, 1),
    AchievementRule::new("quiz_master_10", "Quiz Enthusiast", Metric::QuizzesCompleted, 10),
    AchievementRule::new("quiz_master_50", "Quiz Expert", Metric::QuizzesCompleted, 50),
    AchievementRule::new("quiz_master_100", "Quiz Master", Metric::QuizzesCompleted, 100),
    AchievementRule::new("explorer_10", "Explorer", Metric::CountriesLearned, 10),
    AchievementRule::new("explorer_50", "Globetrotter", Metric::CountriesLearned, 50),
    AchievementRule::new("explorer_100", "World Traveler", Metric::CountriesLearned, 100),
    AchievementRule::new("streak_7", "Week Warrior", Metric::CurrentStreak, 7),
    AchievementRule::new("streak_30", "Monthly Master", Metric::CurrentStreak, 30),
    AchievementRule::new("streak_100", "Unstoppable", Metric::CurrentStreak, 100),
    AchievementRule::new("level_5", "Rising Star", Metric::Level, 5),
    AchievementRule::new("level_10", "Geography Buff", Metric::Level, 10),
    AchievementRule::new("level_25", "Cartographer", Metric::Level, 25),
    AchievementRule::new("level_50", "Geography Legend", Metric::Level, 50),
];

/// Look up a rule by achievement id.
pub fn find(id: &str) -> Option<&'static AchievementRule> {
    CATALOG.iter().find(|rule| rule.id == id)
}
