//! Daily streak reset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use super::JobKind;
use crate::error::JobError;
use crate::storage::Config;
use crate::store::{FieldUpdate, ProgressStore, UserQuery, UserUpdate};
use crate::streak::StreakPolicy;

const JOB: &str = JobKind::ResetStreaks.as_str();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakResetReport {
    /// Candidates returned by the population query.
    pub scanned: usize,
    /// Streaks set to zero.
    pub reset: usize,
    pub batches: usize,
}

/// Zero the current streak of every user inactive past the threshold.
///
/// Writes go out in batches of `jobs.batch_size`. If a batch fails, the
/// error carries how many users earlier batches already committed.
pub fn reset_streaks<S: ProgressStore + ?Sized>(
    store: &S,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<StreakResetReport, JobError> {
    let policy = StreakPolicy::with_config(config.streaks.policy_config());
    let candidates = store
        .query_users(&UserQuery::stale_streaks(&policy, now))
        .map_err(|source| JobError::QueryFailed { job: JOB, source })?;

    // The store may evaluate the query loosely; the policy is authoritative.
    let updates: Vec<UserUpdate> = candidates
        .iter()
        .filter(|doc| policy.should_reset(&doc.progress, now))
        .map(|doc| {
            debug!(user_id = %doc.id, streak = doc.progress.current_streak, "streak lapsed");
            UserUpdate::new(doc.id.clone(), vec![FieldUpdate::SetCurrentStreak(0)])
        })
        .collect();

    let mut report = StreakResetReport {
        scanned: candidates.len(),
        ..StreakResetReport::default()
    };

    for (index, chunk) in updates.chunks(config.jobs.batch_size.max(1)).enumerate() {
        if let Err(source) = store.batch_update(chunk) {
            error!(batch = index + 1, committed = report.reset, "streak reset batch failed");
            return Err(JobError::BatchFailed {
                job: JOB,
                batch: index + 1,
                committed: report.reset,
                source,
            });
        }
        report.reset += chunk.len();
        report.batches += 1;
    }

    info!(scanned = report.scanned, reset = report.reset, batches = report.batches, "streaks reset");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::UserDocument;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn user(id: &str, streak: u32, days_ago: Option<i64>) -> UserDocument {
        let mut doc = UserDocument::new(id, now());
        doc.progress.current_streak = streak;
        doc.progress.longest_streak = streak;
        doc.progress.last_active_date = days_ago.map(|d| now() - Duration::days(d));
        doc
    }

    #[test]
    fn resets_only_lapsed_streaks() {
        let store = MemoryStore::with_users([
            user("lapsed", 5, Some(3)),
            user("fresh", 5, Some(1)),
            user("never", 2, None),
            user("zero", 0, Some(10)),
        ]);
        let report = reset_streaks(&store, &Config::default(), now()).unwrap();
        assert_eq!(report, StreakResetReport { scanned: 2, reset: 2, batches: 1 });

        let streak = |id: &str| store.get_user(id).unwrap().unwrap().progress.current_streak;
        assert_eq!(streak("lapsed"), 0);
        assert_eq!(streak("never"), 0);
        assert_eq!(streak("fresh"), 5);
        assert_eq!(store.get_user("lapsed").unwrap().unwrap().progress.longest_streak, 5);
    }

    #[test]
    fn exactly_at_threshold_is_kept() {
        let store = MemoryStore::with_users([user("edge", 4, Some(2))]);
        let report = reset_streaks(&store, &Config::default(), now()).unwrap();
        assert_eq!(report.reset, 0);
        assert_eq!(report.batches, 0);
    }

    #[test]
    fn writes_in_bounded_batches() {
        let store = MemoryStore::with_users((0..7).map(|i| user(&format!("u{i}"), 3, Some(5))));
        let mut config = Config::default();
        config.jobs.batch_size = 3;
        let report = reset_streaks(&store, &config, now()).unwrap();
        assert_eq!(report.reset, 7);
        assert_eq!(report.batches, 3);
        assert_eq!(store.batch_calls(), 3);
    }

    #[test]
    fn batch_failure_reports_committed_count() {
        let store = MemoryStore::with_users((0..5).map(|i| user(&format!("u{i}"), 3, Some(5))));
        store.fail_batches_after(1);
        let mut config = Config::default();
        config.jobs.batch_size = 2;

        match reset_streaks(&store, &config, now()) {
            Err(JobError::BatchFailed { batch, committed, .. }) => {
                assert_eq!(batch, 2);
                assert_eq!(committed, 2);
            }
            other => panic!("expected batch failure, got {other:?}"),
        }
        let zeroed = (0..5)
            .filter(|i| store.get_user(&format!("u{i}")).unwrap().unwrap().progress.current_streak == 0)
            .count();
        assert_eq!(zeroed, 2);
    }

    #[test]
    fn query_failure_writes_nothing() {
        let store = MemoryStore::with_users([user("lapsed", 5, Some(3))]);
        store.fail_next_query();
        assert!(matches!(
            reset_streaks(&store, &Config::default(), now()),
            Err(JobError::QueryFailed { .. })
        ));
        assert_eq!(store.batch_calls(), 0);
        assert_eq!(store.get_user("lapsed").unwrap().unwrap().progress.current_streak, 5);
    }

    #[test]
    fn huge_window_from_unvalidated_config_runs() {
        let store = MemoryStore::with_users([user("old", 5, Some(5000)), user("never", 2, None)]);
        let mut config = Config::default();
        config.streaks.inactivity_threshold_days = 100_000_000;

        let report = reset_streaks(&store, &config, now()).unwrap();
        assert_eq!(report.reset, 1);
        assert_eq!(store.get_user("old").unwrap().unwrap().progress.current_streak, 5);
        assert_eq!(store.get_user("never").unwrap().unwrap().progress.current_streak, 0);
    }
}
