//! SQLite-backed progress store.
//!
//! Provides persistent storage for:
//! - User documents (identity, preferences, progress counters)
//! - Unlocked achievements, one row per (user, achievement)
//! - `learned_countries` and `quiz_history` subcollections
//! - Device tokens for push delivery
//! - Leaderboard snapshots, replaced wholesale per board
//! - The job ledger

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::{data_dir, migrations};
use crate::error::StoreError;
use crate::jobs::{JobKind, JobRun, JobStatus};
use crate::leaderboard::{LeaderboardEntry, LeaderboardSnapshot};
use crate::progress::{Preferences, ProgressChange, UserDocument, UserProgress};
use crate::store::{FieldUpdate, JobLedger, ProgressStore, PurgeSummary, TokenDirectory, UserQuery, UserUpdate};

const USER_COLUMNS: &str = "id, email, display_name, photo_url, is_anonymous, is_email_verified,
    is_premium, created_at, last_login_at, preferences, total_xp, level, current_streak,
    longest_streak, last_active_date, countries_learned, quizzes_completed, questions_answered,
    correct_answers, region_progress";

/// One entry of a user's `quiz_history` subcollection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRecord {
    pub region: String,
    pub score: u32,
    pub total_questions: u32,
    pub xp_earned: u64,
    pub completed_at: DateTime<Utc>,
}

/// Fixed-width UTC timestamps so that text comparison orders correctly.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn corrupt(user_id: &str, message: impl Into<String>) -> StoreError {
    StoreError::CorruptDocument {
        user_id: user_id.to_string(),
        message: message.into(),
    }
}

/// Raw `users` row before JSON columns and achievements are attached.
struct UserRow {
    doc: UserDocument,
    preferences: String,
    region_progress: String,
    created_at: String,
    last_login_at: String,
    last_active_date: Option<String>,
}

fn read_user_row(row: &Row) -> Result<UserRow, rusqlite::Error> {
    let id: String = row.get(0)?;
    let mut doc = UserDocument::new(id, Utc::now());
    doc.email = row.get(1)?;
    doc.display_name = row.get(2)?;
    doc.photo_url = row.get(3)?;
    doc.is_anonymous = row.get(4)?;
    doc.is_email_verified = row.get(5)?;
    doc.is_premium = row.get(6)?;
    doc.progress.total_xp = row.get(10)?;
    doc.progress.level = row.get(11)?;
    doc.progress.current_streak = row.get(12)?;
    doc.progress.longest_streak = row.get(13)?;
    doc.progress.countries_learned = row.get(15)?;
    doc.progress.quizzes_completed = row.get(16)?;
    doc.progress.questions_answered = row.get(17)?;
    doc.progress.correct_answers = row.get(18)?;
    Ok(UserRow {
        doc,
        created_at: row.get(7)?,
        last_login_at: row.get(8)?,
        preferences: row.get(9)?,
        last_active_date: row.get(14)?,
        region_progress: row.get(19)?,
    })
}

fn load_achievements(conn: &Connection, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT achievement_id FROM user_achievements WHERE user_id = ?1",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(ids)
}

fn finish_user(conn: &Connection, raw: UserRow) -> Result<UserDocument, StoreError> {
    let UserRow {
        mut doc,
        preferences,
        region_progress,
        created_at,
        last_login_at,
        last_active_date,
    } = raw;

    doc.preferences = serde_json::from_str::<Preferences>(&preferences)
        .map_err(|e| corrupt(&doc.id, format!("preferences: {e}")))?;
    doc.progress.region_progress = serde_json::from_str::<BTreeMap<String, u32>>(&region_progress)
        .map_err(|e| corrupt(&doc.id, format!("region_progress: {e}")))?;
    doc.created_at = parse_ts(&created_at).ok_or_else(|| corrupt(&doc.id, "created_at"))?;
    doc.last_login_at = parse_ts(&last_login_at).ok_or_else(|| corrupt(&doc.id, "last_login_at"))?;
    doc.progress.last_active_date = match last_active_date {
        Some(raw) => Some(parse_ts(&raw).ok_or_else(|| corrupt(&doc.id, "last_active_date"))?),
        None => None,
    };
    doc.progress.unlocked_achievements = load_achievements(conn, &doc.id)?;
    Ok(doc)
}

fn load_user(conn: &Connection, id: &str) -> Result<Option<UserDocument>, StoreError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let raw = conn.query_row(&sql, params![id], read_user_row).optional()?;
    raw.map(|raw| finish_user(conn, raw)).transpose()
}

fn user_exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn union_achievements<'a>(
    conn: &Connection,
    user_id: &str,
    ids: impl IntoIterator<Item = &'a String>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
         VALUES (?1, ?2, ?3)",
    )?;
    for id in ids {
        stmt.execute(params![user_id, id, ts(now)])?;
    }
    Ok(())
}

fn write_progress(conn: &Connection, user_id: &str, progress: &UserProgress, now: DateTime<Utc>) -> Result<(), StoreError> {
    let region_progress = serde_json::to_string(&progress.region_progress)
        .map_err(|e| corrupt(user_id, e.to_string()))?;
    conn.execute(
        "UPDATE users SET
            total_xp = ?2, level = ?3, current_streak = ?4, longest_streak = ?5,
            last_active_date = ?6, countries_learned = ?7, quizzes_completed = ?8,
            questions_answered = ?9, correct_answers = ?10, region_progress = ?11
         WHERE id = ?1",
        params![
            user_id,
            progress.total_xp,
            progress.level,
            progress.current_streak,
            progress.longest_streak,
            progress.last_active_date.map(ts),
            progress.countries_learned,
            progress.quizzes_completed,
            progress.questions_answered,
            progress.correct_answers,
            region_progress,
        ],
    )?;
    union_achievements(conn, user_id, &progress.unlocked_achievements, now)
}

fn apply_field(conn: &Connection, user_id: &str, field: &FieldUpdate, now: DateTime<Utc>) -> Result<(), StoreError> {
    match field {
        FieldUpdate::SetCurrentStreak(streak) => {
            conn.execute(
                "UPDATE users SET current_streak = ?2 WHERE id = ?1",
                params![user_id, streak],
            )?;
        }
        FieldUpdate::UnionAchievements(ids) => union_achievements(conn, user_id, ids, now)?,
        FieldUpdate::SetProgress(progress) => write_progress(conn, user_id, progress, now)?,
        FieldUpdate::SetPreferences(prefs) => {
            let json = serde_json::to_string(prefs).map_err(|e| corrupt(user_id, e.to_string()))?;
            conn.execute(
                "UPDATE users SET preferences = ?2 WHERE id = ?1",
                params![user_id, json],
            )?;
        }
        FieldUpdate::TouchLastLogin => {
            conn.execute(
                "UPDATE users SET last_login_at = ?2 WHERE id = ?1",
                params![user_id, ts(now)],
            )?;
        }
    }
    Ok(())
}

/// SQLite store for user progress, tokens, leaderboards and job runs.
pub struct ProgressDb {
    conn: Connection,
}

impl ProgressDb {
    /// Open the database at `<data dir>/geomaster.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::DataDir(e.to_string()))?;
        Self::open_at(&dir.join("geomaster.db"))
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    fn immediate(&self) -> Result<Transaction<'_>, StoreError> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }

    /// Add a country to the user's `learned_countries` subcollection.
    ///
    /// Returns false if it was already recorded.
    pub fn record_learned_country(
        &self,
        user_id: &str,
        country_code: &str,
        learned_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO learned_countries (user_id, country_code, learned_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, country_code.to_uppercase(), ts(learned_at)],
        )?;
        Ok(inserted > 0)
    }

    pub fn learned_countries(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT country_code FROM learned_countries WHERE user_id = ?1 ORDER BY country_code",
        )?;
        let codes = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(codes)
    }

    /// Append to the user's `quiz_history` subcollection.
    pub fn record_quiz_result(&self, user_id: &str, record: &QuizRecord) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO quiz_history (user_id, region, score, total_questions, xp_earned, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                record.region,
                record.score,
                record.total_questions,
                record.xp_earned,
                ts(record.completed_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Newest first.
    pub fn quiz_history(&self, user_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT region, score, total_questions, xp_earned, completed_at
             FROM quiz_history WHERE user_id = ?1 ORDER BY completed_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (region, score, total_questions, xp_earned, completed_at) = row?;
            records.push(QuizRecord {
                region,
                score,
                total_questions,
                xp_earned,
                completed_at: parse_ts(&completed_at)
                    .ok_or_else(|| corrupt(user_id, "quiz_history.completed_at"))?,
            });
        }
        Ok(records)
    }
}

impl ProgressStore for ProgressDb {
    fn get_user(&self, id: &str) -> Result<Option<UserDocument>, StoreError> {
        load_user(&self.conn, id)
    }

    fn put_user(&self, doc: &UserDocument) -> Result<(), StoreError> {
        let now = Utc::now();
        let preferences =
            serde_json::to_string(&doc.preferences).map_err(|e| corrupt(&doc.id, e.to_string()))?;
        let tx = self.immediate()?;
        tx.execute(
            "INSERT INTO users (id, email, display_name, photo_url, is_anonymous,
                is_email_verified, is_premium, created_at, last_login_at, preferences)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                photo_url = excluded.photo_url,
                is_anonymous = excluded.is_anonymous,
                is_email_verified = excluded.is_email_verified,
                is_premium = excluded.is_premium,
                created_at = excluded.created_at,
                last_login_at = excluded.last_login_at,
                preferences = excluded.preferences",
            params![
                doc.id,
                doc.email,
                doc.display_name,
                doc.photo_url,
                doc.is_anonymous,
                doc.is_email_verified,
                doc.is_premium,
                ts(doc.created_at),
                ts(doc.last_login_at),
                preferences,
            ],
        )?;
        write_progress(&tx, &doc.id, &doc.progress, now)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<PurgeSummary, StoreError> {
        let tx = self.immediate()?;
        let summary = PurgeSummary {
            achievements: tx.execute("DELETE FROM user_achievements WHERE user_id = ?1", params![id])?,
            learned_countries: tx.execute("DELETE FROM learned_countries WHERE user_id = ?1", params![id])?,
            quiz_history: tx.execute("DELETE FROM quiz_history WHERE user_id = ?1", params![id])?,
            device_tokens: tx.execute("DELETE FROM device_tokens WHERE user_id = ?1", params![id])?,
            user_found: tx.execute("DELETE FROM users WHERE id = ?1", params![id])? > 0,
        };
        tx.commit()?;
        Ok(summary)
    }

    fn query_users(&self, query: &UserQuery) -> Result<Vec<UserDocument>, StoreError> {
        let (filter, args): (String, Vec<Box<dyn rusqlite::ToSql>>) = match query {
            UserQuery::All => ("ORDER BY id".to_string(), Vec::new()),
            UserQuery::StaleStreaks { inactive_before } => (
                "WHERE current_streak > 0
                   AND (last_active_date IS NULL OR last_active_date < ?1)
                 ORDER BY id"
                    .to_string(),
                vec![Box::new(ts(*inactive_before))],
            ),
            UserQuery::ReminderOptIn => (
                "WHERE COALESCE(json_extract(preferences, '$.dailyReminderEnabled'), 1) = 1
                   AND COALESCE(json_extract(preferences, '$.notificationsEnabled'), 1) = 1
                 ORDER BY id"
                    .to_string(),
                Vec::new(),
            ),
            UserQuery::TopByXp { limit } => (
                "ORDER BY total_xp DESC, id ASC LIMIT ?1".to_string(),
                vec![Box::new(i64::try_from(*limit).unwrap_or(i64::MAX))],
            ),
        };

        let sql = format!("SELECT {USER_COLUMNS} FROM users {filter}");
        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), read_user_row)?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter()
            .map(|raw| finish_user(&self.conn, raw))
            .collect()
    }

    fn batch_update(&self, updates: &[UserUpdate]) -> Result<(), StoreError> {
        let now = Utc::now();
        let tx = self.immediate()?;
        for update in updates {
            if !user_exists(&tx, &update.user_id)? {
                // Dropping the transaction rolls back earlier updates.
                return Err(StoreError::UserNotFound(update.user_id.clone()));
            }
            for field in &update.fields {
                apply_field(&tx, &update.user_id, field, now)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn modify_progress(
        &self,
        id: &str,
        edit: &mut dyn FnMut(&mut UserProgress),
    ) -> Result<Option<ProgressChange>, StoreError> {
        let now = Utc::now();
        let tx = self.immediate()?;
        let Some(doc) = load_user(&tx, id)? else {
            return Ok(None);
        };

        let before = doc.progress;
        let mut after = before.clone();
        edit(&mut after);
        // Unlocks are monotone.
        after
            .unlocked_achievements
            .extend(before.unlocked_achievements.iter().cloned());

        write_progress(&tx, id, &after, now)?;
        tx.commit()?;
        Ok(Some(ProgressChange { before, after }))
    }

    fn write_leaderboard(&self, snapshot: &LeaderboardSnapshot) -> Result<u64, StoreError> {
        let entries = serde_json::to_string(&snapshot.entries)
            .map_err(|e| StoreError::QueryFailed(format!("encode leaderboard: {e}")))?;
        let tx = self.immediate()?;
        let previous: Option<u64> = tx
            .query_row(
                "SELECT version FROM leaderboards WHERE board_id = ?1",
                params![snapshot.board_id],
                |row| row.get(0),
            )
            .optional()?;
        let version = previous.unwrap_or(0) + 1;
        tx.execute(
            "INSERT OR REPLACE INTO leaderboards (board_id, version, updated_at, entries)
             VALUES (?1, ?2, ?3, ?4)",
            params![snapshot.board_id, version, ts(snapshot.updated_at), entries],
        )?;
        tx.commit()?;
        Ok(version)
    }

    fn read_leaderboard(&self, board_id: &str) -> Result<Option<LeaderboardSnapshot>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT version, updated_at, entries FROM leaderboards WHERE board_id = ?1",
                params![board_id],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((version, updated_at, entries)) = row else {
            return Ok(None);
        };
        let entries: Vec<LeaderboardEntry> = serde_json::from_str(&entries)
            .map_err(|e| StoreError::QueryFailed(format!("decode leaderboard '{board_id}': {e}")))?;
        let updated_at = parse_ts(&updated_at)
            .ok_or_else(|| StoreError::QueryFailed(format!("bad timestamp on leaderboard '{board_id}'")))?;
        Ok(Some(LeaderboardSnapshot {
            board_id: board_id.to_string(),
            version,
            updated_at,
            entries,
        }))
    }
}

impl TokenDirectory for ProgressDb {
    fn get_token(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let token: Option<String> = self
            .conn
            .query_row(
                "SELECT token FROM device_tokens WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    fn set_token(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO device_tokens (user_id, token, updated_at) VALUES (?1, ?2, ?3)",
            params![user_id, token, ts(Utc::now())],
        )?;
        Ok(())
    }

    fn remove_token(&self, user_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM device_tokens WHERE user_id = ?1", params![user_id])?;
        Ok(removed > 0)
    }
}

impl JobLedger for ProgressDb {
    fn record_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO job_runs (id, job, started_at, finished_at, status, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.id,
                run.job.as_str(),
                ts(run.started_at),
                ts(run.finished_at),
                run.status.as_str(),
                run.detail,
            ],
        )?;
        Ok(())
    }

    fn last_job_run(&self, job: JobKind) -> Result<Option<JobRun>, StoreError> {
        let sql = "SELECT id, job, started_at, finished_at, status, detail FROM job_runs
                   WHERE job = ?1 ORDER BY started_at DESC LIMIT 1";
        let row = self
            .conn
            .query_row(sql, params![job.as_str()], read_job_row)
            .optional()?;
        row.map(job_run_from_row).transpose()
    }

    fn list_job_runs(&self, limit: usize) -> Result<Vec<JobRun>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, job, started_at, finished_at, status, detail FROM job_runs
             ORDER BY started_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], read_job_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(job_run_from_row).collect()
    }
}

type JobRow = (String, String, String, String, String, String);

fn read_job_row(row: &Row) -> Result<JobRow, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn job_run_from_row((id, job, started_at, finished_at, status, detail): JobRow) -> Result<JobRun, StoreError> {
    let bad = |what: &str| StoreError::QueryFailed(format!("job run {id}: bad {what}"));
    Ok(JobRun {
        job: job.parse::<JobKind>().map_err(|_| bad("job"))?,
        started_at: parse_ts(&started_at).ok_or_else(|| bad("started_at"))?,
        finished_at: parse_ts(&finished_at).ok_or_else(|| bad("finished_at"))?,
        status: status.parse::<JobStatus>().map_err(|_| bad("status"))?,
        detail,
        id: id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_user(id: &str, xp: u64) -> UserDocument {
        let mut doc = UserDocument::new(id, Utc::now());
        doc.display_name = Some(format!("Player {id}"));
        doc.email = Some(format!("{id}@example.com"));
        doc.is_anonymous = false;
        doc.progress.total_xp = xp;
        doc
    }

    #[test]
    fn put_and_get_round_trip() {
        let db = ProgressDb::open_memory().unwrap();
        let mut doc = make_user("u1", 120);
        doc.progress.last_active_date = Some(Utc::now() - Duration::hours(3));
        doc.progress.unlocked_achievements.insert("first_quiz".into());
        doc.progress.region_progress.insert("europe".into(), 4);
        doc.preferences.interests = vec!["capitals".into()];
        db.put_user(&doc).unwrap();

        let loaded = db.get_user("u1").unwrap().unwrap();
        assert_eq!(loaded.progress.total_xp, 120);
        assert_eq!(loaded.email.as_deref(), Some("u1@example.com"));
        assert!(loaded.progress.has_unlocked("first_quiz"));
        assert_eq!(loaded.progress.region_progress["europe"], 4);
        assert_eq!(loaded.preferences.interests, vec!["capitals".to_string()]);
        assert_eq!(
            loaded.progress.last_active_date.map(|d| d.timestamp_micros()),
            doc.progress.last_active_date.map(|d| d.timestamp_micros())
        );
    }

    #[test]
    fn get_missing_user_is_none() {
        let db = ProgressDb::open_memory().unwrap();
        assert!(db.get_user("nobody").unwrap().is_none());
    }

    #[test]
    fn union_achievements_is_idempotent() {
        let db = ProgressDb::open_memory().unwrap();
        db.put_user(&make_user("u1", 0)).unwrap();
        let update = UserUpdate::new(
            "u1",
            vec![FieldUpdate::UnionAchievements(vec!["quiz_master_10".into()])],
        );
        db.batch_update(&[update.clone()]).unwrap();
        db.batch_update(&[update]).unwrap();

        let doc = db.get_user("u1").unwrap().unwrap();
        assert_eq!(doc.progress.unlocked_achievements.len(), 1);
    }

    #[test]
    fn batch_update_is_all_or_nothing() {
        let db = ProgressDb::open_memory().unwrap();
        let mut doc = make_user("u1", 0);
        doc.progress.current_streak = 9;
        db.put_user(&doc).unwrap();

        let result = db.batch_update(&[
            UserUpdate::new("u1", vec![FieldUpdate::SetCurrentStreak(0)]),
            UserUpdate::new("ghost", vec![FieldUpdate::SetCurrentStreak(0)]),
        ]);
        assert!(matches!(result, Err(StoreError::UserNotFound(id)) if id == "ghost"));
        assert_eq!(db.get_user("u1").unwrap().unwrap().progress.current_streak, 9);
    }

    #[test]
    fn modify_progress_returns_before_and_after() {
        let db = ProgressDb::open_memory().unwrap();
        let mut doc = make_user("u1", 0);
        doc.progress.quizzes_completed = 9;
        doc.progress.unlocked_achievements.insert("first_quiz".into());
        db.put_user(&doc).unwrap();

        let change = db
            .modify_progress("u1", &mut |p| {
                p.quizzes_completed += 1;
                p.unlocked_achievements.clear();
            })
            .unwrap()
            .unwrap();
        assert_eq!(change.before.quizzes_completed, 9);
        assert_eq!(change.after.quizzes_completed, 10);
        assert!(change.after.has_unlocked("first_quiz"));
        assert!(db.get_user("u1").unwrap().unwrap().progress.has_unlocked("first_quiz"));
    }

    #[test]
    fn modify_progress_on_missing_user_is_none() {
        let db = ProgressDb::open_memory().unwrap();
        assert!(db.modify_progress("ghost", &mut |_| {}).unwrap().is_none());
    }

    #[test]
    fn stale_streak_query_pushes_down_predicate() {
        let db = ProgressDb::open_memory().unwrap();
        let now = Utc::now();
        for (id, streak, days_ago) in [("a", 4, Some(3)), ("b", 4, Some(1)), ("c", 0, Some(9)), ("d", 2, None)] {
            let mut doc = make_user(id, 0);
            doc.progress.current_streak = streak;
            doc.progress.last_active_date = days_ago.map(|d| now - Duration::days(d));
            db.put_user(&doc).unwrap();
        }

        let query = UserQuery::StaleStreaks {
            inactive_before: now - Duration::days(2),
        };
        let ids: Vec<_> = db.query_users(&query).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn reminder_query_respects_preferences() {
        let db = ProgressDb::open_memory().unwrap();
        db.put_user(&make_user("on", 0)).unwrap();
        let mut off = make_user("off", 0);
        off.preferences.daily_reminder_enabled = false;
        db.put_user(&off).unwrap();
        let mut muted = make_user("muted", 0);
        muted.preferences.notifications_enabled = false;
        db.put_user(&muted).unwrap();

        let ids: Vec<_> = db
            .query_users(&UserQuery::ReminderOptIn)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["on"]);
    }

    #[test]
    fn top_by_xp_orders_with_id_tiebreak() {
        let db = ProgressDb::open_memory().unwrap();
        for (id, xp) in [("b", 50), ("a", 50), ("c", 80), ("d", 10)] {
            db.put_user(&make_user(id, xp)).unwrap();
        }
        let ids: Vec<_> = db
            .query_users(&UserQuery::TopByXp { limit: 3 })
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn delete_user_cascades() {
        let db = ProgressDb::open_memory().unwrap();
        let mut doc = make_user("u1", 0);
        doc.progress.unlocked_achievements.insert("first_quiz".into());
        db.put_user(&doc).unwrap();
        db.put_user(&make_user("u2", 0)).unwrap();
        db.record_learned_country("u1", "fr", Utc::now()).unwrap();
        db.record_learned_country("u2", "de", Utc::now()).unwrap();
        db.record_quiz_result(
            "u1",
            &QuizRecord {
                region: "europe".into(),
                score: 8,
                total_questions: 10,
                xp_earned: 80,
                completed_at: Utc::now(),
            },
        )
        .unwrap();
        db.set_token("u1", "tok").unwrap();

        let summary = db.delete_user("u1").unwrap();
        assert_eq!(
            summary,
            PurgeSummary {
                user_found: true,
                achievements: 1,
                learned_countries: 1,
                quiz_history: 1,
                device_tokens: 1,
            }
        );
        assert!(db.get_user("u1").unwrap().is_none());
        assert!(db.quiz_history("u1").unwrap().is_empty());
        assert_eq!(db.learned_countries("u2").unwrap(), vec!["DE".to_string()]);
    }

    #[test]
    fn leaderboard_write_replaces_and_bumps_version() {
        let db = ProgressDb::open_memory().unwrap();
        let now = Utc::now();
        let first = LeaderboardSnapshot::new("global", now, crate::leaderboard::rank(&[make_user("a", 5)], 10, now));
        assert_eq!(db.write_leaderboard(&first).unwrap(), 1);

        let second = LeaderboardSnapshot::new("global", now, Vec::new());
        assert_eq!(db.write_leaderboard(&second).unwrap(), 2);

        let stored = db.read_leaderboard("global").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert!(stored.entries.is_empty());
        assert!(db.read_leaderboard("weekly").unwrap().is_none());
    }

    #[test]
    fn tokens_set_get_remove() {
        let db = ProgressDb::open_memory().unwrap();
        assert!(db.get_token("u1").unwrap().is_none());
        db.set_token("u1", "abc").unwrap();
        db.set_token("u1", "def").unwrap();
        assert_eq!(db.get_token("u1").unwrap().as_deref(), Some("def"));
        assert!(db.remove_token("u1").unwrap());
        assert!(!db.remove_token("u1").unwrap());
    }

    #[test]
    fn job_ledger_returns_latest_first() {
        let db = ProgressDb::open_memory().unwrap();
        let now = Utc::now();
        for (offset, status) in [(2, JobStatus::Failed), (1, JobStatus::Succeeded)] {
            let started = now - Duration::hours(offset);
            db.record_job_run(&JobRun {
                id: uuid::Uuid::new_v4().to_string(),
                job: JobKind::SendReminders,
                started_at: started,
                finished_at: started + Duration::seconds(3),
                status,
                detail: String::new(),
            })
            .unwrap();
        }
        let last = db.last_job_run(JobKind::SendReminders).unwrap().unwrap();
        assert_eq!(last.status, JobStatus::Succeeded);
        assert!(db.last_job_run(JobKind::ResetStreaks).unwrap().is_none());
        assert_eq!(db.list_job_runs(10).unwrap().len(), 2);
    }

    #[test]
    fn on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geomaster.db");
        {
            let db = ProgressDb::open_at(&path).unwrap();
            db.put_user(&make_user("u1", 42)).unwrap();
        }
        let db = ProgressDb::open_at(&path).unwrap();
        assert_eq!(db.get_user("u1").unwrap().unwrap().progress.total_xp, 42);
    }
}
