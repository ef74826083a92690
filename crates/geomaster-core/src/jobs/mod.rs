//! Scheduled batch jobs and the progress-write trigger.
//!
//! Each job is invoked with only "now", re-reads the population it needs
//! and writes back in bounded batches. [`run_job`] wraps a job with tracing
//! and a ledger entry.

mod achievements;
mod leaderboard;
mod reminders;
mod streaks;

pub use achievements::{apply_progress, backfill_achievements, on_progress_written, ProgressOutcome};
pub use leaderboard::refresh_leaderboard;
pub use reminders::{send_reminders, ReminderReport};
pub use streaks::{reset_streaks, StreakResetReport};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::notify::NotificationGateway;
use crate::storage::Config;
use crate::store::{JobLedger, ProgressStore, TokenDirectory};

/// The scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ResetStreaks,
    RefreshLeaderboard,
    SendReminders,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::ResetStreaks,
        JobKind::RefreshLeaderboard,
        JobKind::SendReminders,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            JobKind::ResetStreaks => "reset_streaks",
            JobKind::RefreshLeaderboard => "refresh_leaderboard",
            JobKind::SendReminders => "send_reminders",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| format!("unknown job '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub id: String,
    pub job: JobKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobStatus,
    /// Summary on success, error message on failure.
    pub detail: String,
}

/// What a successful job produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobOutcome {
    ResetStreaks(StreakResetReport),
    RefreshLeaderboard {
        board_id: String,
        version: u64,
        entries: usize,
    },
    SendReminders(ReminderReport),
}

impl JobOutcome {
    pub fn summary(&self) -> String {
        match self {
            JobOutcome::ResetStreaks(r) => format!(
                "scanned {} users, reset {} streaks in {} batches",
                r.scanned, r.reset, r.batches
            ),
            JobOutcome::RefreshLeaderboard {
                board_id,
                version,
                entries,
            } => format!("board '{board_id}' v{version} with {entries} entries"),
            JobOutcome::SendReminders(r) => format!(
                "sent {}, failed {}, skipped {} active, {} opted out, {} without token",
                r.sent, r.failed, r.skipped_active, r.skipped_opted_out, r.skipped_no_token
            ),
        }
    }
}

/// Run one job at `now`, log its outcome and record it in the ledger.
///
/// A ledger write failure is logged and does not change the result.
pub fn run_job<S>(
    store: &S,
    gateway: &dyn NotificationGateway,
    config: &Config,
    job: JobKind,
    now: DateTime<Utc>,
) -> Result<JobOutcome, JobError>
where
    S: ProgressStore + TokenDirectory + JobLedger + ?Sized,
{
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("job", job = job.as_str(), run_id = %run_id);
    let _enter = span.enter();

    if job == JobKind::SendReminders {
        warn_if_already_swept(store, now);
    }

    let timer = Instant::now();
    let result = match job {
        JobKind::ResetStreaks => reset_streaks(store, config, now).map(JobOutcome::ResetStreaks),
        JobKind::RefreshLeaderboard => {
            refresh_leaderboard(store, config, now).map(|snapshot| JobOutcome::RefreshLeaderboard {
                entries: snapshot.entries.len(),
                board_id: snapshot.board_id,
                version: snapshot.version,
            })
        }
        JobKind::SendReminders => {
            send_reminders(store, store, gateway, config, now).map(JobOutcome::SendReminders)
        }
    };
    let elapsed = Duration::from_std(timer.elapsed()).unwrap_or_else(|_| Duration::zero());

    let (status, detail) = match &result {
        Ok(outcome) => {
            info!(elapsed_ms = elapsed.num_milliseconds(), "{}", outcome.summary());
            (JobStatus::Succeeded, outcome.summary())
        }
        Err(err) => {
            error!(elapsed_ms = elapsed.num_milliseconds(), "job aborted: {err}");
            (JobStatus::Failed, err.to_string())
        }
    };

    let run = JobRun {
        id: run_id,
        job,
        started_at: now,
        finished_at: now + elapsed,
        status,
        detail,
    };
    if let Err(err) = store.record_job_run(&run) {
        warn!("failed to record job run: {err}");
    }

    result
}

/// Overlapping sweeps are not prevented; flag a second one on the same UTC day.
fn warn_if_already_swept<S: JobLedger + ?Sized>(store: &S, now: DateTime<Utc>) {
    match store.last_job_run(JobKind::SendReminders) {
        Ok(Some(previous))
            if previous.status == JobStatus::Succeeded
                && previous.started_at.date_naive() == now.date_naive() =>
        {
            warn!(
                previous_run = %previous.id,
                previous_started = %previous.started_at,
                "reminder sweep already ran today; users may be notified twice"
            );
        }
        Ok(_) => {}
        Err(err) => warn!("could not read job ledger: {err}"),
    }
}
