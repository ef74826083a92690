//! Inactivity-based streak decay.
//!
//! A streak survives as long as the user was active within the last
//! `inactivity_threshold_days`. Once that window lapses the current streak
//! drops to zero; the longest streak is kept.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::UserProgress;

/// Largest accepted inactivity window, in days.
pub const MAX_INACTIVITY_DAYS: i64 = 36_500;

/// Configuration for streak decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakPolicyConfig {
    /// Days without activity after which the current streak resets.
    #[serde(default = "default_inactivity_days")]
    pub inactivity_threshold_days: i64,
}

fn default_inactivity_days() -> i64 {
    2
}

impl Default for StreakPolicyConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_days: default_inactivity_days(),
        }
    }
}

/// Decides whether a user's current streak must be reset.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreakPolicy {
    config: StreakPolicyConfig,
}

impl StreakPolicy {
    /// Create a policy with the default two-day window
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: StreakPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StreakPolicyConfig {
        &self.config
    }

    /// Activity strictly before this instant counts as lapsed.
    ///
    /// A window reaching past the representable range lapses nobody.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_days(self.config.inactivity_threshold_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// True iff the streak is positive and the user has been inactive for
    /// longer than the threshold (or was never active).
    pub fn should_reset_streak(
        &self,
        last_active_date: Option<DateTime<Utc>>,
        current_streak: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if current_streak == 0 {
            return false;
        }
        match last_active_date {
            None => true,
            Some(last_active) => last_active < self.cutoff(now),
        }
    }

    /// Convenience over a progress snapshot.
    pub fn should_reset(&self, progress: &UserProgress, now: DateTime<Utc>) -> bool {
        self.should_reset_streak(progress.last_active_date, progress.current_streak, now)
    }
}

/// Free-function form with the default threshold.
pub fn should_reset_streak(
    last_active_date: Option<DateTime<Utc>>,
    current_streak: u32,
    now: DateTime<Utc>,
) -> bool {
    StreakPolicy::new().should_reset_streak(last_active_date, current_streak, now)
}
