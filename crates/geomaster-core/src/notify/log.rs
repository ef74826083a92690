//! Dry-run gateway.

use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::{fingerprint, NotificationGateway, PushMessage};
use crate::error::NotificationError;

/// Logs every push instead of delivering it, and remembers what it saw.
#[derive(Debug, Default)]
pub struct LogGateway {
    sent: Mutex<Vec<PushMessage>>,
}

impl LogGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationGateway for LogGateway {
    fn send(&self, message: &PushMessage) -> Result<(), NotificationError> {
        info!(
            token = %fingerprint(&message.token),
            title = %message.title,
            body = %message.body,
            "push (dry run)"
        );
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
