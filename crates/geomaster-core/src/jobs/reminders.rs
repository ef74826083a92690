//! Daily reminder sweep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::JobKind;
use crate::error::JobError;
use crate::notify::{fingerprint, NotificationGateway, PushMessage};
use crate::reminder::{self, ReminderPreferences};
use crate::storage::Config;
use crate::store::{ProgressStore, TokenDirectory, UserQuery};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub scanned: usize,
    pub sent: usize,
    /// Token lookup or delivery failed.
    pub failed: usize,
    /// Already active today.
    pub skipped_active: usize,
    /// A preference flag is off.
    pub skipped_opted_out: usize,
    pub skipped_no_token: usize,
}

/// Send today's reminder to every opted-in user who has not been active.
///
/// Per-user failures are logged and counted; only a failed population
/// query aborts the sweep.
pub fn send_reminders<S, T, G>(
    store: &S,
    tokens: &T,
    gateway: &G,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<ReminderReport, JobError>
where
    S: ProgressStore + ?Sized,
    T: TokenDirectory + ?Sized,
    G: NotificationGateway + ?Sized,
{
    let users = store
        .query_users(&UserQuery::ReminderOptIn)
        .map_err(|source| JobError::QueryFailed {
            job: JobKind::SendReminders.as_str(),
            source,
        })?;

    let today = now.date_naive();
    let title = config.reminders.title.as_str();
    let mut report = ReminderReport {
        scanned: users.len(),
        ..ReminderReport::default()
    };

    for user in &users {
        let streak = user.progress.current_streak;
        let prefs = ReminderPreferences::from(&user.preferences);
        let decision = reminder::evaluate(prefs, user.progress.last_active_date, streak, today);
        if !decision.should_send {
            if prefs.daily_reminder_enabled && prefs.notifications_enabled {
                report.skipped_active += 1;
            } else {
                report.skipped_opted_out += 1;
            }
            continue;
        }

        let token = match tokens.get_token(&user.id) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(user_id = %user.id, "no device token");
                report.skipped_no_token += 1;
                continue;
            }
            Err(err) => {
                warn!(user_id = %user.id, "token lookup failed: {err}");
                report.failed += 1;
                continue;
            }
        };

        let Some(message) = PushMessage::from_decision(decision.with_token(token), title, streak) else {
            continue;
        };
        match gateway.send(&message) {
            Ok(()) => {
                debug!(user_id = %user.id, token = %fingerprint(&message.token), "reminder sent");
                report.sent += 1;
            }
            Err(err) => {
                warn!(
                    user_id = %user.id,
                    token = %fingerprint(&message.token),
                    gateway = gateway.name(),
                    "reminder delivery failed: {err}"
                );
                report.failed += 1;
            }
        }
    }

    info!(
        sent = report.sent,
        failed = report.failed,
        skipped_active = report.skipped_active,
        skipped_opted_out = report.skipped_opted_out,
        skipped_no_token = report.skipped_no_token,
        "reminder sweep finished"
    );
    Ok(report)
}
