//! Push delivery for reminder notifications.
//!
//! The reminder sweep only sees [`NotificationGateway`]. Two implementations
//! ship: [`WebhookGateway`] posts each message as JSON to an HTTP relay that
//! forwards to the push provider, and [`LogGateway`] records messages through
//! `tracing` and delivers nothing (used when no relay is configured).

mod log;
mod webhook;

pub use self::log::LogGateway;
pub use webhook::WebhookGateway;

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::NotificationError;
use crate::reminder::{self, ReminderDecision};
use crate::storage::RemindersConfig;

/// One push notification addressed to a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    /// Build the reminder push for a positive decision.
    ///
    /// Returns `None` when the decision is negative or has no token.
    pub fn from_decision(decision: ReminderDecision, title: &str, current_streak: u32) -> Option<Self> {
        if !decision.should_send {
            return None;
        }
        let token = decision.target_token?;
        Some(Self {
            token,
            title: title.to_string(),
            body: decision.message_body,
            data: reminder::data_payload(current_streak),
        })
    }
}

/// Delivers a push to one device. Implementations make a single attempt.
pub trait NotificationGateway {
    fn send(&self, message: &PushMessage) -> Result<(), NotificationError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

impl<G: NotificationGateway + ?Sized> NotificationGateway for Box<G> {
    fn send(&self, message: &PushMessage) -> Result<(), NotificationError> {
        (**self).send(message)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// First 12 hex chars of the token's SHA-256. Raw tokens never reach logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(12);
    hex
}

/// Gateway selected by `[reminders]`: webhook when `gateway_url` is set,
/// logging otherwise.
pub fn from_config(config: &RemindersConfig) -> Result<Box<dyn NotificationGateway + Send + Sync>, NotificationError> {
    match config.gateway_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let gateway = WebhookGateway::new(url, config.gateway_key.clone(), config.timeout_secs)?;
            Ok(Box::new(gateway))
        }
        _ => Ok(Box::new(LogGateway::new())),
    }
}
