//! In-memory store.
//!
//! Backs tests and dry runs. Implements the same traits as
//! [`ProgressDb`](super::ProgressDb) with client-side query evaluation, and
//! can be told to fail so callers can exercise their error paths.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::jobs::{JobKind, JobRun};
use crate::leaderboard::LeaderboardSnapshot;
use crate::progress::{ProgressChange, UserDocument, UserProgress};
use crate::store::{FieldUpdate, JobLedger, ProgressStore, PurgeSummary, TokenDirectory, UserQuery, UserUpdate};

#[derive(Debug, Default)]
struct Inner {
    users: BTreeMap<String, UserDocument>,
    tokens: BTreeMap<String, String>,
    leaderboards: BTreeMap<String, LeaderboardSnapshot>,
    job_runs: Vec<JobRun>,
    fail_next_query: bool,
    /// Remaining batch_update calls allowed to succeed.
    batches_before_failure: Option<usize>,
    fail_leaderboard_writes: bool,
    batch_calls: usize,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `users`.
    pub fn with_users(users: impl IntoIterator<Item = UserDocument>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for user in users {
                inner.users.insert(user.id.clone(), user);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `query_users` call fail.
    pub fn fail_next_query(&self) {
        self.lock().fail_next_query = true;
    }

    /// Let `n` more `batch_update` calls succeed, then fail every one after.
    pub fn fail_batches_after(&self, n: usize) {
        self.lock().batches_before_failure = Some(n);
    }

    pub fn fail_leaderboard_writes(&self, fail: bool) {
        self.lock().fail_leaderboard_writes = fail;
    }

    /// Number of `batch_update` calls made so far, failed ones included.
    pub fn batch_calls(&self) -> usize {
        self.lock().batch_calls
    }

    pub fn len(&self) -> usize {
        self.lock().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_field(doc: &mut UserDocument, field: &FieldUpdate) {
    match field {
        FieldUpdate::SetCurrentStreak(streak) => doc.progress.current_streak = *streak,
        FieldUpdate::UnionAchievements(ids) => {
            doc.progress.unlocked_achievements.extend(ids.iter().cloned());
        }
        FieldUpdate::SetProgress(progress) => {
            let mut next = progress.clone();
            next.unlocked_achievements
                .extend(doc.progress.unlocked_achievements.iter().cloned());
            doc.progress = next;
        }
        FieldUpdate::SetPreferences(prefs) => doc.preferences = prefs.clone(),
        FieldUpdate::TouchLastLogin => doc.last_login_at = Utc::now(),
    }
}

impl ProgressStore for MemoryStore {
    fn get_user(&self, id: &str) -> Result<Option<UserDocument>, StoreError> {
        Ok(self.lock().users.get(id).cloned())
    }

    fn put_user(&self, doc: &UserDocument) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let mut doc = doc.clone();
        if let Some(existing) = inner.users.get(&doc.id) {
            doc.progress
                .unlocked_achievements
                .extend(existing.progress.unlocked_achievements.iter().cloned());
        }
        inner.users.insert(doc.id.clone(), doc);
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<PurgeSummary, StoreError> {
        let mut inner = self.lock();
        let removed = inner.users.remove(id);
        let token = inner.tokens.remove(id);
        Ok(PurgeSummary {
            user_found: removed.is_some(),
            achievements: removed
                .as_ref()
                .map_or(0, |doc| doc.progress.unlocked_achievements.len()),
            learned_countries: 0,
            quiz_history: 0,
            device_tokens: usize::from(token.is_some()),
        })
    }

    fn query_users(&self, query: &UserQuery) -> Result<Vec<UserDocument>, StoreError> {
        let mut inner = self.lock();
        if std::mem::take(&mut inner.fail_next_query) {
            return Err(StoreError::QueryFailed("injected query failure".into()));
        }
        Ok(query.apply(inner.users.values().cloned()))
    }

    fn batch_update(&self, updates: &[UserUpdate]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.batch_calls += 1;
        match inner.batches_before_failure {
            Some(0) => return Err(StoreError::Locked),
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }

        if let Some(missing) = updates.iter().find(|u| !inner.users.contains_key(&u.user_id)) {
            return Err(StoreError::UserNotFound(missing.user_id.clone()));
        }
        for update in updates {
            if let Some(doc) = inner.users.get_mut(&update.user_id) {
                for field in &update.fields {
                    apply_field(doc, field);
                }
            }
        }
        Ok(())
    }

    fn modify_progress(
        &self,
        id: &str,
        edit: &mut dyn FnMut(&mut UserProgress),
    ) -> Result<Option<ProgressChange>, StoreError> {
        let mut inner = self.lock();
        let Some(doc) = inner.users.get_mut(id) else {
            return Ok(None);
        };
        let before = doc.progress.clone();
        edit(&mut doc.progress);
        doc.progress
            .unlocked_achievements
            .extend(before.unlocked_achievements.iter().cloned());
        Ok(Some(ProgressChange {
            before,
            after: doc.progress.clone(),
        }))
    }

    fn write_leaderboard(&self, snapshot: &LeaderboardSnapshot) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        if inner.fail_leaderboard_writes {
            return Err(StoreError::Locked);
        }
        let version = inner
            .leaderboards
            .get(&snapshot.board_id)
            .map_or(0, |s| s.version)
            + 1;
        let mut stored = snapshot.clone();
        stored.version = version;
        inner.leaderboards.insert(stored.board_id.clone(), stored);
        Ok(version)
    }

    fn read_leaderboard(&self, board_id: &str) -> Result<Option<LeaderboardSnapshot>, StoreError> {
        Ok(self.lock().leaderboards.get(board_id).cloned())
    }
}

impl TokenDirectory for MemoryStore {
    fn get_token(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()
            .tokens
            .get(user_id)
            .filter(|t| !t.is_empty())
            .cloned())
    }

    fn set_token(&self, user_id: &str, token: &str) -> Result<(), StoreError> {
        self.lock().tokens.insert(user_id.to_string(), token.to_string());
        Ok(())
    }

    fn remove_token(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.lock().tokens.remove(user_id).is_some())
    }
}

impl JobLedger for MemoryStore {
    fn record_job_run(&self, run: &JobRun) -> Result<(), StoreError> {
        self.lock().job_runs.push(run.clone());
        Ok(())
    }

    fn last_job_run(&self, job: JobKind) -> Result<Option<JobRun>, StoreError> {
        Ok(self
            .lock()
            .job_runs
            .iter()
            .filter(|run| run.job == job)
            .max_by_key(|run| run.started_at)
            .cloned())
    }

    fn list_job_runs(&self, limit: usize) -> Result<Vec<JobRun>, StoreError> {
        let mut runs = self.lock().job_runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
