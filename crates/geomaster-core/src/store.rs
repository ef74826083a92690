//! Storage seams consumed by the engine.
//!
//! The engine never holds population state between invocations; every job
//! reads what it needs through [`ProgressStore::query_users`] and writes back
//! through bounded [`ProgressStore::batch_update`] calls. Implementations:
//! [`ProgressDb`](crate::storage::ProgressDb) (SQLite) and
//! [`MemoryStore`](crate::storage::MemoryStore).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::error::StoreError;
use crate::jobs::{JobKind, JobRun};
use crate::leaderboard::LeaderboardSnapshot;
use crate::progress::{Preferences, ProgressChange, UserDocument, UserProgress};
use crate::streak::StreakPolicy;

/// Population queries the jobs issue.
///
/// Stores may push the predicate down or filter client-side with
/// [`UserQuery::matches`]; either is correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserQuery {
    /// Every user document.
    All,
    /// Users with a positive streak whose last activity is absent or
    /// strictly before `inactive_before`.
    StaleStreaks { inactive_before: DateTime<Utc> },
    /// Users with both daily reminders and notifications enabled.
    ReminderOptIn,
    /// The `limit` users with the most XP, ties by id ascending.
    TopByXp { limit: usize },
}

impl UserQuery {
    /// Stale-streak query for the policy's cutoff at `now`.
    pub fn stale_streaks(policy: &StreakPolicy, now: DateTime<Utc>) -> Self {
        UserQuery::StaleStreaks {
            inactive_before: policy.cutoff(now),
        }
    }

    /// Whether a document passes this query's filter.
    pub fn matches(&self, doc: &UserDocument) -> bool {
        match self {
            UserQuery::All | UserQuery::TopByXp { .. } => true,
            UserQuery::StaleStreaks { inactive_before } => {
                doc.progress.current_streak > 0
                    && doc
                        .progress
                        .last_active_date
                        .map_or(true, |last| last < *inactive_before)
            }
            UserQuery::ReminderOptIn => {
                doc.preferences.daily_reminder_enabled && doc.preferences.notifications_enabled
            }
        }
    }

    /// Client-side evaluation: filter, order and limit.
    pub fn apply(&self, docs: impl IntoIterator<Item = UserDocument>) -> Vec<UserDocument> {
        let mut selected: Vec<UserDocument> = docs.into_iter().filter(|d| self.matches(d)).collect();
        match self {
            UserQuery::TopByXp { limit } => {
                selected.sort_by(by_xp_desc);
                selected.truncate(*limit);
            }
            _ => selected.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        selected
    }
}

fn by_xp_desc(a: &UserDocument, b: &UserDocument) -> Ordering {
    b.progress
        .total_xp
        .cmp(&a.progress.total_xp)
        .then_with(|| a.id.cmp(&b.id))
}

/// A single field mutation inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    SetCurrentStreak(u32),
    /// Set union into the unlocked-achievements set.
    UnionAchievements(Vec<String>),
    /// Replace progress counters. Unlocked achievements are unioned, never
    /// removed.
    SetProgress(UserProgress),
    SetPreferences(Preferences),
    /// Stamp `last_login_at` with the store's clock.
    TouchLastLogin,
}

/// All field updates for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub user_id: String,
    pub fields: Vec<FieldUpdate>,
}

impl UserUpdate {
    pub fn new(user_id: impl Into<String>, fields: Vec<FieldUpdate>) -> Self {
        Self {
            user_id: user_id.into(),
            fields,
        }
    }
}

/// Rows removed by a cascading account delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub user_found: bool,
    pub achievements: usize,
    pub learned_countries: usize,
    pub quiz_history: usize,
    pub device_tokens: usize,
}

/// Durable keyed store of user documents.
pub trait ProgressStore {
    fn get_user(&self, id: &str) -> Result<Option<UserDocument>, StoreError>;

    /// Insert or fully replace a user document.
    fn put_user(&self, doc: &UserDocument) -> Result<(), StoreError>;

    /// Remove the document and every dependent row.
    fn delete_user(&self, id: &str) -> Result<PurgeSummary, StoreError>;

    fn query_users(&self, query: &UserQuery) -> Result<Vec<UserDocument>, StoreError>;

    /// Apply all updates atomically. Fails as a whole if any user is missing.
    fn batch_update(&self, updates: &[UserUpdate]) -> Result<(), StoreError>;

    /// Atomic read-modify-write of one user's progress.
    ///
    /// Returns the before/after pair, or `None` if the user does not exist.
    fn modify_progress(
        &self,
        id: &str,
        edit: &mut dyn FnMut(&mut UserProgress),
    ) -> Result<Option<ProgressChange>, StoreError>;

    /// Replace the stored snapshot for `snapshot.board_id`. Returns the new
    /// version number.
    fn write_leaderboard(&self, snapshot: &LeaderboardSnapshot) -> Result<u64, StoreError>;

    fn read_leaderboard(&self, board_id: &str) -> Result<Option<LeaderboardSnapshot>, StoreError>;
}

/// Device-token lookup, kept apart from the user document.
pub trait TokenDirectory {
    /// `None` means "do not attempt to send".
    fn get_token(&self, user_id: &str) -> Result<Option<String>, StoreError>;

    fn set_token(&self, user_id: &str, token: &str) -> Result<(), StoreError>;

    fn remove_token(&self, user_id: &str) -> Result<bool, StoreError>;
}

/// Record of batch job executions.
pub trait JobLedger {
    fn record_job_run(&self, run: &JobRun) -> Result<(), StoreError>;

    /// Most recent run of `job`, successful or not.
    fn last_job_run(&self, job: JobKind) -> Result<Option<JobRun>, StoreError>;

    /// Latest runs first.
    fn list_job_runs(&self, limit: usize) -> Result<Vec<JobRun>, StoreError>;
}
