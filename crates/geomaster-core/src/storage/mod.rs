mod config;
pub mod memory;
pub mod migrations;
pub mod progress_db;

pub use config::{
    Config, JobsConfig, LeaderboardConfig, RemindersConfig, ScheduleConfig, StreaksConfig,
};
pub use memory::MemoryStore;
pub use progress_db::{ProgressDb, QuizRecord};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `GEOMASTER_DATA_DIR` overrides the location outright. Otherwise this is
/// `~/.config/geomaster[-dev]/`, with the `-dev` suffix when
/// `GEOMASTER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("GEOMASTER_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("GEOMASTER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("geomaster-dev")
            } else {
                base_dir.join("geomaster")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
