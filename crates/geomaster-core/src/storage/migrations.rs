//! Database schema migrations for geomaster.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use indoc::indoc;
use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(err) => Err(err),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: user documents, unlocked achievements, per-user
/// subcollections, device tokens and leaderboard snapshots.
///
/// Progress counters are real columns so the batch jobs can filter and
/// order in SQL; preferences and region progress are JSON blobs.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS users (
            id                 TEXT PRIMARY KEY,
            email              TEXT,
            display_name       TEXT,
            photo_url          TEXT,
            is_anonymous       INTEGER NOT NULL DEFAULT 1,
            is_email_verified  INTEGER NOT NULL DEFAULT 0,
            is_premium         INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            last_login_at      TEXT NOT NULL,
            preferences        TEXT NOT NULL DEFAULT '{}',
            total_xp           INTEGER NOT NULL DEFAULT 0,
            level              INTEGER NOT NULL DEFAULT 1,
            current_streak     INTEGER NOT NULL DEFAULT 0,
            longest_streak     INTEGER NOT NULL DEFAULT 0,
            last_active_date   TEXT,
            countries_learned  INTEGER NOT NULL DEFAULT 0,
            quizzes_completed  INTEGER NOT NULL DEFAULT 0,
            questions_answered INTEGER NOT NULL DEFAULT 0,
            correct_answers    INTEGER NOT NULL DEFAULT 0,
            region_progress    TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS user_achievements (
            user_id        TEXT NOT NULL,
            achievement_id TEXT NOT NULL,
            unlocked_at    TEXT NOT NULL,
            PRIMARY KEY (user_id, achievement_id)
        );

        CREATE TABLE IF NOT EXISTS learned_countries (
            user_id      TEXT NOT NULL,
            country_code TEXT NOT NULL,
            learned_at   TEXT NOT NULL,
            PRIMARY KEY (user_id, country_code)
        );

        CREATE TABLE IF NOT EXISTS quiz_history (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id         TEXT NOT NULL,
            region          TEXT NOT NULL,
            score           INTEGER NOT NULL,
            total_questions INTEGER NOT NULL,
            xp_earned       INTEGER NOT NULL DEFAULT 0,
            completed_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS device_tokens (
            user_id    TEXT PRIMARY KEY,
            token      TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS leaderboards (
            board_id   TEXT PRIMARY KEY,
            version    INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            entries    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_total_xp ON users(total_xp DESC, id);
        CREATE INDEX IF NOT EXISTS idx_users_streak ON users(current_streak, last_active_date);
        CREATE INDEX IF NOT EXISTS idx_quiz_history_user ON quiz_history(user_id);
    "})?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: job ledger.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS job_runs (
            id          TEXT PRIMARY KEY,
            job         TEXT NOT NULL,
            started_at  TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            status      TEXT NOT NULL,
            detail      TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_job_runs_job_started ON job_runs(job, started_at);
    "})?;

    set_schema_version(&tx, 2)?;
    tx.commit()
}
