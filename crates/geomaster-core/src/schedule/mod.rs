//! Fire times for the scheduled batch jobs.
//!
//! Jobs run at fixed wall-clock points in UTC: daily at `hour:minute` or
//! hourly at `:minute`. Missed fire times are not replayed; after a pause
//! the scheduler simply waits for the next one. Each invocation carries only
//! "now".

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::JobKind;
use crate::storage::ScheduleConfig;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "lowercase")]
pub enum JobSchedule {
    Hourly { minute: u32 },
    Daily { hour: u32, minute: u32 },
}

impl JobSchedule {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            JobSchedule::Hourly { minute } if minute > 59 => {
                Err(format!("minute {minute} out of range 0-59"))
            }
            JobSchedule::Daily { hour, .. } if hour > 23 => {
                Err(format!("hour {hour} out of range 0-23"))
            }
            JobSchedule::Daily { minute, .. } if minute > 59 => {
                Err(format!("minute {minute} out of range 0-59"))
            }
            _ => Ok(()),
        }
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let (period, offset) = match *self {
            JobSchedule::Hourly { minute } => {
                (Duration::hours(1), Duration::minutes(i64::from(minute)))
            }
            JobSchedule::Daily { hour, minute } => (
                Duration::days(1),
                Duration::hours(i64::from(hour)) + Duration::minutes(i64::from(minute)),
            ),
        };
        // Truncation is relative to the Unix epoch, which is midnight UTC.
        let period_start = after.duration_trunc(period).unwrap_or(after);
        let candidate = period_start + offset;
        if candidate > after {
            candidate
        } else {
            candidate + period
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            JobSchedule::Hourly { minute } => format!("hourly at :{minute:02} UTC"),
            JobSchedule::Daily { hour, minute } => format!("daily at {hour:02}:{minute:02} UTC"),
        }
    }
}

/// The next instant at which one or more jobs fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRun {
    pub at: DateTime<Utc>,
    pub jobs: Vec<JobKind>,
}

/// Plans job invocations from the configured schedules.
#[derive(Debug, Clone)]
pub struct Scheduler {
    entries: Vec<(JobKind, JobSchedule)>,
}

impl Scheduler {
    pub fn new(entries: Vec<(JobKind, JobSchedule)>) -> Self {
        Self { entries }
    }

    /// Streak reset, leaderboard refresh and reminder sweep from config.
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(vec![
            (JobKind::ResetStreaks, config.streak_reset),
            (JobKind::RefreshLeaderboard, config.leaderboard_refresh),
            (JobKind::SendReminders, config.reminders),
        ])
    }

    pub fn entries(&self) -> &[(JobKind, JobSchedule)] {
        &self.entries
    }

    /// Earliest fire time strictly after `after`, with every job due then.
    ///
    /// Jobs sharing a fire time are returned in configuration order.
    pub fn next_run(&self, after: DateTime<Utc>) -> Option<PlannedRun> {
        let at = self
            .entries
            .iter()
            .map(|(_, schedule)| schedule.next_after(after))
            .min()?;
        let jobs = self
            .entries
            .iter()
            .filter(|(_, schedule)| schedule.next_after(after) == at)
            .map(|(job, _)| *job)
            .collect();
        Some(PlannedRun { at, jobs })
    }
}
