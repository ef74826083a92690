pub mod account;
pub mod achievements;
pub mod config;
pub mod jobs;
pub mod leaderboard;
pub mod progress;
pub mod serve;
pub mod token;

use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Pretty JSON to stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
