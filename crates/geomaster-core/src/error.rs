//! Core error types for geomaster-core.
//!
//! Each concern (storage, configuration, notification delivery, batch jobs)
//! has its own thiserror enum; `CoreError` wraps them for callers that do
//! not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for geomaster-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Store-related errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Push delivery errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Batch job errors
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`ProgressStore`](crate::store::ProgressStore) or
/// [`TokenDirectory`](crate::store::TokenDirectory) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A write targeted a user document that does not exist
    #[error("User '{0}' not found")]
    UserNotFound(String),

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// A stored document column could not be decoded
    #[error("Corrupt document for user '{user_id}': {message}")]
    CorruptDocument { user_id: String, message: String },

    /// The data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Errors from a single push delivery attempt.
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Transport failure (connect, timeout, TLS)
    #[error("Push transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The relay answered with a non-success status
    #[error("Push rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The gateway endpoint is not a usable URL
    #[error("Invalid gateway endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

/// Errors that abort a scheduled batch job.
#[derive(Error, Debug)]
pub enum JobError {
    /// The population scan failed; nothing was written.
    #[error("Population query for {job} failed: {source}")]
    QueryFailed {
        job: &'static str,
        #[source]
        source: StoreError,
    },

    /// A write batch failed after earlier batches were committed.
    #[error("Batch {batch} of {job} failed after {committed} users were committed: {source}")]
    BatchFailed {
        job: &'static str,
        batch: usize,
        committed: usize,
        #[source]
        source: StoreError,
    },

    /// The leaderboard snapshot could not be written; the previous one remains.
    #[error("Failed to write leaderboard snapshot: {0}")]
    SnapshotWrite(#[source] StoreError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
