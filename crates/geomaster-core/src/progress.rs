//! User document and progress model.
//!
//! A [`UserDocument`] is the unit the store keeps per account: identity
//! fields, [`Preferences`] and the [`UserProgress`] counters the engine
//! evaluates. Every field is defaulted on decode so that partially written
//! or legacy documents never fail to load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Progress counters for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(default)]
    pub total_xp: u64,
    /// Derived from XP by gameplay code; the engine only reads it.
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    /// `None` means the user has never been active.
    #[serde(default)]
    pub last_active_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub countries_learned: u32,
    #[serde(default)]
    pub quizzes_completed: u32,
    #[serde(default)]
    pub questions_answered: u32,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub unlocked_achievements: BTreeSet<String>,
    /// Countries learned per region, keyed by region slug.
    #[serde(default)]
    pub region_progress: BTreeMap<String, u32>,
}

fn default_level() -> u32 {
    1
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: default_level(),
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            countries_learned: 0,
            quizzes_completed: 0,
            questions_answered: 0,
            correct_answers: 0,
            unlocked_achievements: BTreeSet::new(),
            region_progress: BTreeMap::new(),
        }
    }
}

impl UserProgress {
    /// Whether the achievement id is already unlocked.
    pub fn has_unlocked(&self, achievement_id: &str) -> bool {
        self.unlocked_achievements.contains(achievement_id)
    }

    /// Stamp activity at `now` and advance the daily streak.
    ///
    /// A second activity on the same UTC day leaves the streak alone. The
    /// streak continues only from activity on the previous UTC day; after
    /// a longer gap, or with no prior activity, it restarts at 1.
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        let last_day = self.last_active_date.map(|last| last.date_naive());

        if last_day != Some(today) {
            let continues = last_day.is_some_and(|day| today.pred_opt() == Some(day));
            self.current_streak = if continues {
                self.current_streak.saturating_add(1)
            } else {
                1
            };
            self.longest_streak = self.longest_streak.max(self.current_streak);
        }
        self.last_active_date = Some(now);
    }

    /// Fraction of answered questions that were correct, 0.0 when none.
    pub fn accuracy(&self) -> f64 {
        if self.questions_answered == 0 {
            0.0
        } else {
            self.correct_answers as f64 / self.questions_answered as f64
        }
    }
}

/// Per-user application preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub is_dark_mode: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub haptics_enabled: bool,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub daily_reminder_enabled: bool,
    #[serde(default = "default_daily_goal")]
    pub daily_goal_minutes: u32,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

fn default_language() -> String {
    "en".into()
}
fn default_true() -> bool {
    true
}
fn default_daily_goal() -> u32 {
    15
}
fn default_difficulty() -> String {
    "medium".into()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: default_language(),
            is_dark_mode: false,
            sound_enabled: true,
            haptics_enabled: true,
            notifications_enabled: true,
            daily_reminder_enabled: true,
            daily_goal_minutes: default_daily_goal(),
            difficulty_level: default_difficulty(),
            interests: Vec::new(),
        }
    }
}

/// The stored account document: identity, preferences and progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub progress: UserProgress,
}

impl UserDocument {
    /// A fresh document with default preferences and zeroed progress.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
            photo_url: None,
            is_anonymous: true,
            is_email_verified: false,
            is_premium: false,
            created_at: now,
            last_login_at: now,
            preferences: Preferences::default(),
            progress: UserProgress::default(),
        }
    }
}

/// Before and after images of a single progress write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressChange {
    pub before: UserProgress,
    pub after: UserProgress,
}
