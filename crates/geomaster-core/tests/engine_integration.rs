//! End-to-end tests against the SQLite store.
//!
//! Each test opens a fresh database in a temp directory and drives the
//! engine through its public API only.

use chrono::{DateTime, Duration, TimeZone, Utc};
use geomaster_core::jobs::{self, JobKind, JobOutcome};
use geomaster_core::lifecycle::{on_account_created, on_account_deleted, AccountIdentity};
use geomaster_core::storage::{Config, ProgressDb, QuizRecord};
use geomaster_core::store::{JobLedger, ProgressStore, TokenDirectory};
use geomaster_core::{LogGateway, NotificationError, NotificationGateway, PushMessage};
use std::collections::BTreeSet;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn open_db() -> (TempDir, ProgressDb) {
    let dir = tempfile::tempdir().unwrap();
    let db = ProgressDb::open_at(&dir.path().join("geomaster.db")).unwrap();
    (dir, db)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 7, 15, 9, 0, 0).unwrap()
}

fn create(db: &ProgressDb, uid: &str) {
    let identity = AccountIdentity {
        uid: uid.to_string(),
        email: Some(format!("{uid}@example.com")),
        display_name: Some(format!("Player {uid}")),
        ..AccountIdentity::default()
    };
    on_account_created(db, &identity, now() - Duration::days(30)).unwrap();
}

/// Fails delivery for every token in `reject`.
struct RejectingGateway {
    reject: BTreeSet<String>,
    log: LogGateway,
}

impl NotificationGateway for RejectingGateway {
    fn send(&self, message: &PushMessage) -> Result<(), NotificationError> {
        if self.reject.contains(&message.token) {
            Err(NotificationError::Rejected {
                status: 503,
                body: "unavailable".into(),
            })
        } else {
            self.log.send(message)
        }
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}

// ============================================================================
// Achievement trigger
// ============================================================================

#[test]
fn test_tenth_quiz_persists_quiz_master_10() {
    let (_dir, db) = open_db();
    create(&db, "u1");
    db.modify_progress("u1", &mut |p| p.quizzes_completed = 9).unwrap();

    let outcome = jobs::apply_progress(&db, "u1", |p| p.quizzes_completed += 1)
        .unwrap()
        .unwrap();
    assert_eq!(outcome.unlocked, vec!["quiz_master_10"]);

    let stored = db.get_user("u1").unwrap().unwrap();
    let expected: BTreeSet<String> = ["quiz_master_10".to_string()].into();
    assert_eq!(stored.progress.unlocked_achievements, expected);
}

#[test]
fn test_multi_threshold_jump_unlocks_all_crossed() {
    let (_dir, db) = open_db();
    create(&db, "u1");

    let outcome = jobs::apply_progress(&db, "u1", |p| p.quizzes_completed = 100)
        .unwrap()
        .unwrap();
    assert_eq!(
        outcome.unlocked,
        vec!["first_quiz", "quiz_master_10", "quiz_master_50", "quiz_master_100"]
    );
    assert_eq!(
        db.get_user("u1").unwrap().unwrap().progress.unlocked_achievements.len(),
        4
    );
}

// ============================================================================
// Streak reset
// ============================================================================

#[test]
fn test_streak_reset_across_batches() {
    let (_dir, db) = open_db();
    for i in 0..25 {
        let uid = format!("u{i:02}");
        create(&db, &uid);
        let days_ago = if i % 5 == 0 { 1 } else { 4 };
        db.modify_progress(&uid, &mut |p| {
            p.current_streak = 6;
            p.longest_streak = 6;
            p.last_active_date = Some(now() - Duration::days(days_ago));
        })
        .unwrap();
    }

    let mut config = Config::default();
    config.jobs.batch_size = 7;
    let report = jobs::reset_streaks(&db, &config, now()).unwrap();
    assert_eq!(report.scanned, 20);
    assert_eq!(report.reset, 20);
    assert_eq!(report.batches, 3);

    let kept = db.get_user("u05").unwrap().unwrap().progress;
    assert_eq!(kept.current_streak, 6);
    let lapsed = db.get_user("u01").unwrap().unwrap().progress;
    assert_eq!(lapsed.current_streak, 0);
    assert_eq!(lapsed.longest_streak, 6);
}

// ============================================================================
// Leaderboard
// ============================================================================

#[test]
fn test_leaderboard_keeps_top_hundred() {
    let (_dir, db) = open_db();
    for i in 0..130u64 {
        let uid = format!("user-{i:03}");
        create(&db, &uid);
        db.modify_progress(&uid, &mut |p| p.total_xp = i * 10).unwrap();
    }

    let snapshot = jobs::refresh_leaderboard(&db, &Config::default(), now()).unwrap();
    assert_eq!(snapshot.entries.len(), 100);
    assert_eq!(snapshot.entries[0].user_id, "user-129");
    assert_eq!(snapshot.entries[0].rank, 1);
    assert_eq!(snapshot.entries[99].user_id, "user-030");
    assert!(snapshot
        .entries
        .windows(2)
        .all(|w| w[0].total_xp >= w[1].total_xp));

    let stored = db.read_leaderboard("global").unwrap().unwrap();
    assert_eq!(stored, snapshot);
}

// ============================================================================
// Reminder sweep
// ============================================================================

#[test]
fn test_reminder_sweep_survives_gateway_failures() {
    let (_dir, db) = open_db();
    for uid in ["a", "b", "c", "d"] {
        create(&db, uid);
        db.set_token(uid, &format!("tok-{uid}")).unwrap();
    }
    db.modify_progress("d", &mut |p| p.last_active_date = Some(now() - Duration::hours(1)))
        .unwrap();

    let gateway = RejectingGateway {
        reject: ["tok-b".to_string()].into(),
        log: LogGateway::new(),
    };
    let report = jobs::send_reminders(&db, &db, &gateway, &Config::default(), now()).unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped_active, 1);

    let tokens: Vec<_> = gateway.log.sent().into_iter().map(|m| m.token).collect();
    assert_eq!(tokens, vec!["tok-a", "tok-c"]);
}

#[test]
fn test_run_job_writes_ledger() {
    let (_dir, db) = open_db();
    create(&db, "a");
    db.set_token("a", "tok-a").unwrap();

    let gateway = LogGateway::new();
    let config = Config::default();
    let first = jobs::run_job(&db, &gateway, &config, JobKind::SendReminders, now()).unwrap();
    assert!(matches!(first, JobOutcome::SendReminders(r) if r.sent == 1));

    // A second sweep the same day still runs; it only warns.
    jobs::run_job(&db, &gateway, &config, JobKind::SendReminders, now() + Duration::hours(1)).unwrap();
    assert_eq!(gateway.sent().len(), 2);

    let history = db.list_job_runs(10).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].started_at > history[1].started_at);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_account_delete_cascades_everywhere() {
    let (_dir, db) = open_db();
    create(&db, "gone");
    create(&db, "stays");
    jobs::apply_progress(&db, "gone", |p| p.quizzes_completed = 1).unwrap();
    db.record_learned_country("gone", "jp", now()).unwrap();
    db.record_quiz_result(
        "gone",
        &QuizRecord {
            region: "asia".into(),
            score: 9,
            total_questions: 10,
            xp_earned: 90,
            completed_at: now(),
        },
    )
    .unwrap();
    db.set_token("gone", "tok").unwrap();

    let summary = on_account_deleted(&db, "gone").unwrap();
    assert!(summary.user_found);
    assert_eq!(summary.achievements, 1);
    assert_eq!(summary.learned_countries, 1);
    assert_eq!(summary.quiz_history, 1);
    assert_eq!(summary.device_tokens, 1);

    assert!(db.get_user("gone").unwrap().is_none());
    assert!(db.get_token("gone").unwrap().is_none());
    assert!(db.learned_countries("gone").unwrap().is_empty());
    assert!(db.get_user("stays").unwrap().is_some());
}
