//! Basic CLI E2E tests.
//!
//! Tests invoke the built `geomaster` binary against a temporary data
//! directory and verify outputs.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run a CLI command with `GEOMASTER_DATA_DIR` pointed at `data_dir`.
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_geomaster"))
        .args(args)
        .env("GEOMASTER_DATA_DIR", data_dir)
        .env("GEOMASTER_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

/// Run a command and expect success.
fn run_ok(data_dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
    stdout
}

fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("Failed to parse JSON output")
}

fn data_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn test_account_create_defaults() {
    let dir = data_dir();
    let out = run_ok(dir.path(), &["account", "create", "u1", "--email", "a@example.com", "--name", "Ada"]);
    let doc = parse_json(&out);
    assert_eq!(doc["id"], "u1");
    assert_eq!(doc["isAnonymous"], false);
    assert_eq!(doc["progress"]["level"], 1);
    assert_eq!(doc["progress"]["totalXp"], 0);
}

#[test]
fn test_progress_update_unlocks_achievement() {
    let dir = data_dir();
    run_ok(dir.path(), &["account", "create", "u1"]);
    run_ok(dir.path(), &["progress", "update", "u1", "--add-quizzes", "9"]);

    let out = run_ok(dir.path(), &["progress", "update", "u1", "--add-quizzes", "1"]);
    let result = parse_json(&out);
    assert_eq!(result["unlocked"], serde_json::json!(["quiz_master_10"]));

    let out = run_ok(dir.path(), &["progress", "show", "u1"]);
    let progress = parse_json(&out);
    assert_eq!(progress["quizzesCompleted"], 10);
    let unlocked = progress["unlockedAchievements"].as_array().unwrap();
    assert!(unlocked.iter().any(|id| id == "quiz_master_10"));
}

#[test]
fn test_progress_for_unknown_user_fails() {
    let dir = data_dir();
    let (_, stderr, code) = run_cli(dir.path(), &["progress", "show", "ghost"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no account 'ghost'"));
}

#[test]
fn test_leaderboard_refresh_and_show() {
    let dir = data_dir();
    for (uid, xp) in [("a", "30"), ("b", "90"), ("c", "60")] {
        run_ok(dir.path(), &["account", "create", uid]);
        run_ok(dir.path(), &["progress", "update", uid, "--add-xp", xp]);
    }
    run_ok(dir.path(), &["jobs", "run", "refresh_leaderboard"]);

    let out = run_ok(dir.path(), &["leaderboard", "show"]);
    let board = parse_json(&out);
    let ids: Vec<_> = board["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["userId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["b", "c", "a"]);
    assert_eq!(board["entries"][0]["displayName"], "Anonymous");
}

#[test]
fn test_reminder_dry_run_and_history() {
    let dir = data_dir();
    run_ok(dir.path(), &["account", "create", "u1"]);
    run_ok(dir.path(), &["token", "set", "u1", "device-token"]);

    let out = run_ok(dir.path(), &["jobs", "run", "send_reminders", "--dry-run"]);
    let outcome = parse_json(&out);
    assert_eq!(outcome["job"], "send_reminders");
    assert_eq!(outcome["sent"], 1);

    let out = run_ok(dir.path(), &["jobs", "history"]);
    let runs = parse_json(&out);
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["status"], "succeeded");
}

#[test]
fn test_unknown_job_is_rejected() {
    let dir = data_dir();
    let (_, stderr, code) = run_cli(dir.path(), &["jobs", "run", "vacuum"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown job"));
}

#[test]
fn test_config_set_get_reset() {
    let dir = data_dir();
    run_ok(dir.path(), &["config", "set", "leaderboard.top_n", "25"]);
    assert_eq!(run_ok(dir.path(), &["config", "get", "leaderboard.top_n"]).trim(), "25");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "leaderboard.nope", "1"]);
    assert_ne!(code, 0);

    run_ok(dir.path(), &["config", "reset"]);
    assert_eq!(run_ok(dir.path(), &["config", "get", "leaderboard.top_n"]).trim(), "100");
}

#[test]
fn test_account_delete_reports_purge() {
    let dir = data_dir();
    run_ok(dir.path(), &["account", "create", "u1"]);
    run_ok(dir.path(), &["token", "set", "u1", "tok"]);
    let out = run_ok(dir.path(), &["account", "delete", "u1"]);
    let summary = parse_json(&out);
    assert_eq!(summary["user_found"], true);
    assert_eq!(summary["device_tokens"], 1);

    let (_, _, code) = run_cli(dir.path(), &["progress", "show", "u1"]);
    assert_ne!(code, 0);
}

#[test]
fn test_achievements_list_catalog() {
    let dir = data_dir();
    let out = run_ok(dir.path(), &["achievements", "list"]);
    let catalog = parse_json(&out);
    assert_eq!(catalog.as_array().unwrap().len(), 14);
    assert_eq!(catalog[0]["id"], "first_quiz");
}

#[test]
fn test_achievements_backfill() {
    let dir = data_dir();
    run_ok(dir.path(), &["account", "create", "u1"]);
    run_ok(dir.path(), &["progress", "update", "u1", "--level", "5"]);

    let out = run_ok(dir.path(), &["achievements", "backfill", "u1"]);
    let result = parse_json(&out);
    assert!(result["unlocked"].as_array().unwrap().is_empty());

    let out = run_ok(dir.path(), &["achievements", "list", "--user", "u1"]);
    let rows = parse_json(&out);
    let level_5 = rows.as_array().unwrap().iter().find(|r| r["id"] == "level_5").unwrap();
    assert_eq!(level_5["unlocked"], true);
    assert_eq!(level_5["goal"], "5 level");
}

#[test]
fn test_preferences_opt_out_skips_reminder() {
    let dir = data_dir();
    run_ok(dir.path(), &["account", "create", "u1"]);
    run_ok(dir.path(), &["token", "set", "u1", "device-token"]);

    let out = run_ok(dir.path(), &["account", "preferences", "u1", "--daily-reminder", "false"]);
    assert_eq!(parse_json(&out)["dailyReminderEnabled"], false);

    let out = run_ok(dir.path(), &["jobs", "run", "send_reminders", "--dry-run"]);
    let outcome = parse_json(&out);
    assert_eq!(outcome["scanned"], 0);
    assert_eq!(outcome["sent"], 0);
}

#[test]
fn test_config_clears_gateway_url() {
    let dir = data_dir();
    run_ok(dir.path(), &["config", "set", "reminders.gateway_url", "https://push.example.com/send"]);
    run_ok(dir.path(), &["config", "set", "reminders.gateway_url", ""]);
    assert_eq!(run_ok(dir.path(), &["config", "get", "reminders.gateway_url"]).trim(), "null");
}
