//! TOML-based engine configuration.
//!
//! Holds the tunables of the batch jobs:
//! - Streak inactivity window
//! - Leaderboard size and board id
//! - Reminder title and push gateway endpoint
//! - Batch size for multi-user writes
//! - Fire times of the scheduled jobs
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::leaderboard::DEFAULT_TOP_N;
use crate::reminder::DEFAULT_TITLE;
use crate::schedule::JobSchedule;
use crate::streak::{StreakPolicyConfig, MAX_INACTIVITY_DAYS};

/// Streak decay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreaksConfig {
    #[serde(default = "default_inactivity_days")]
    pub inactivity_threshold_days: i64,
}

/// Leaderboard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_board_id")]
    pub board_id: String,
}

/// Daily reminder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Push relay endpoint. When unset, reminders are only logged.
    #[serde(default)]
    pub gateway_url: Option<String>,
    /// Bearer key sent to the relay.
    #[serde(default)]
    pub gateway_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Batch write settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Maximum users per atomic write batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Fire times of the scheduled jobs (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_streak_reset")]
    pub streak_reset: JobSchedule,
    #[serde(default = "default_leaderboard_refresh")]
    pub leaderboard_refresh: JobSchedule,
    #[serde(default = "default_reminders")]
    pub reminders: JobSchedule,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `<data dir>/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub streaks: StreaksConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

// Default functions
fn default_inactivity_days() -> i64 {
    2
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_board_id() -> String {
    "global".into()
}
fn default_title() -> String {
    DEFAULT_TITLE.into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_batch_size() -> usize {
    500
}
fn default_streak_reset() -> JobSchedule {
    JobSchedule::Daily { hour: 0, minute: 0 }
}
fn default_leaderboard_refresh() -> JobSchedule {
    JobSchedule::Hourly { minute: 0 }
}
fn default_reminders() -> JobSchedule {
    JobSchedule::Daily { hour: 9, minute: 0 }
}

impl Default for StreaksConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_days: default_inactivity_days(),
        }
    }
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            board_id: default_board_id(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            gateway_url: None,
            gateway_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            streak_reset: default_streak_reset(),
            leaderboard_refresh: default_leaderboard_refresh(),
            reminders: default_reminders(),
        }
    }
}

impl StreaksConfig {
    pub fn policy_config(&self) -> StreakPolicyConfig {
        StreakPolicyConfig {
            inactivity_threshold_days: self.inactivity_threshold_days,
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// `optional` marks keys whose default is null; an empty value clears them.
    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
        optional: bool,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ if optional && value.is_empty() => serde_json::Value::Null,
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject values the jobs cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if !(1..=MAX_INACTIVITY_DAYS).contains(&self.streaks.inactivity_threshold_days) {
            return Err(invalid(
                "streaks.inactivity_threshold_days",
                &format!("must be between 1 and {MAX_INACTIVITY_DAYS}"),
            ));
        }
        if self.leaderboard.top_n == 0 {
            return Err(invalid("leaderboard.top_n", "must be positive"));
        }
        if self.leaderboard.board_id.trim().is_empty() {
            return Err(invalid("leaderboard.board_id", "must not be empty"));
        }
        if self.jobs.batch_size == 0 {
            return Err(invalid("jobs.batch_size", "must be positive"));
        }
        if let Some(endpoint) = &self.reminders.gateway_url {
            url::Url::parse(endpoint)
                .map_err(|e| invalid("reminders.gateway_url", &e.to_string()))?;
        }
        for (key, schedule) in [
            ("schedule.streak_reset", &self.schedule.streak_reset),
            ("schedule.leaderboard_refresh", &self.schedule.leaderboard_refresh),
            ("schedule.reminders", &self.schedule.reminders),
        ] {
            schedule.validate().map_err(|message| invalid(key, &message))?;
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, or the value cannot be
    /// parsed or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        let defaults = serde_json::to_value(Self::default())
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        let optional = Self::get_json_value_by_path(&defaults, key).is_some_and(|v| v.is_null());
        Self::set_json_value_by_path(&mut json, key, value, optional)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
