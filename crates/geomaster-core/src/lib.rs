//! # GeoMaster Core Library
//!
//! Progress engine for the GeoMaster geography-learning app: decides when
//! achievements unlock, when streaks lapse, who ranks on the leaderboard and
//! who gets a daily reminder, and runs those decisions as batch jobs over a
//! store of user documents.
//!
//! ## Architecture
//!
//! - **Rules**: pure functions over progress snapshots ([`RuleSet`],
//!   [`StreakPolicy`], [`leaderboard::rank`], [`reminder::evaluate`])
//! - **Storage**: the [`ProgressStore`] / [`TokenDirectory`] seams with a
//!   SQLite implementation ([`ProgressDb`]) and an in-memory one
//!   ([`MemoryStore`]); TOML configuration ([`Config`])
//! - **Jobs**: streak reset, leaderboard refresh and reminder sweep, plus the
//!   achievement trigger that runs on every progress write
//! - **Delivery**: [`NotificationGateway`] with an HTTP relay and a logging
//!   implementation
//! - **Schedule**: fire times for the jobs ([`Scheduler`])

pub mod achievements;
pub mod error;
pub mod jobs;
pub mod leaderboard;
pub mod lifecycle;
pub mod notify;
pub mod progress;
pub mod reminder;
pub mod schedule;
pub mod storage;
pub mod store;
pub mod streak;

pub use achievements::{AchievementRule, Metric, RuleSet, CATALOG};
pub use error::{ConfigError, CoreError, JobError, NotificationError, StoreError};
pub use jobs::{run_job, JobKind, JobOutcome, JobRun, JobStatus, ReminderReport, StreakResetReport};
pub use leaderboard::{LeaderboardEntry, LeaderboardSnapshot};
pub use lifecycle::{on_account_created, on_account_deleted, update_preferences, AccountIdentity};
pub use notify::{LogGateway, NotificationGateway, PushMessage, WebhookGateway};
pub use progress::{Preferences, ProgressChange, UserDocument, UserProgress};
pub use reminder::{ReminderDecision, ReminderPreferences};
pub use schedule::{JobSchedule, PlannedRun, Scheduler};
pub use storage::{Config, MemoryStore, ProgressDb, QuizRecord};
pub use store::{FieldUpdate, JobLedger, ProgressStore, PurgeSummary, TokenDirectory, UserQuery, UserUpdate};
pub use streak::{StreakPolicy, StreakPolicyConfig};
