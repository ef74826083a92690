//! Daily reminder eligibility and message copy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::progress::Preferences;

/// Notification title used when none is configured.
pub const DEFAULT_TITLE: &str = "GeoMaster Daily Reminder";

/// Data payload `type` value for reminder pushes.
pub const REMINDER_KIND: &str = "daily_reminder";

/// The two preference flags that gate reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPreferences {
    pub daily_reminder_enabled: bool,
    pub notifications_enabled: bool,
}

impl From<&Preferences> for ReminderPreferences {
    fn from(prefs: &Preferences) -> Self {
        Self {
            daily_reminder_enabled: prefs.daily_reminder_enabled,
            notifications_enabled: prefs.notifications_enabled,
        }
    }
}

/// Outcome of evaluating one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderDecision {
    pub should_send: bool,
    /// Empty when `should_send` is false.
    pub message_body: String,
    /// Filled in by the sweep once the device token is resolved.
    pub target_token: Option<String>,
}

impl ReminderDecision {
    fn skip() -> Self {
        Self {
            should_send: false,
            message_body: String::new(),
            target_token: None,
        }
    }

    /// Attach the resolved device token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.target_token = Some(token.into());
        self
    }
}

/// Message body for a user with the given streak.
pub fn compose_message(current_streak: u32) -> String {
    if current_streak > 0 {
        format!("Don't break your {current_streak}-day streak! Take a quick geography quiz today.")
    } else {
        "Ready to explore the world? Start your geography journey today!".to_string()
    }
}

/// Data payload sent alongside the notification.
pub fn data_payload(current_streak: u32) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("type".to_string(), REMINDER_KIND.to_string()),
        ("streak".to_string(), current_streak.to_string()),
    ])
}

/// Whether the user should get today's reminder, and with what body.
///
/// Eligible when both preference flags are on and the user has not been
/// active on `today` (dates compared in UTC).
pub fn evaluate(
    prefs: ReminderPreferences,
    last_active_date: Option<DateTime<Utc>>,
    current_streak: u32,
    today: NaiveDate,
) -> ReminderDecision {
    if !prefs.daily_reminder_enabled || !prefs.notifications_enabled {
        return ReminderDecision::skip();
    }
    if let Some(last_active) = last_active_date {
        if last_active.date_naive() >= today {
            return ReminderDecision::skip();
        }
    }
    ReminderDecision {
        should_send: true,
        message_body: compose_message(current_streak),
        target_token: None,
    }
}
