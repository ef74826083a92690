//! Hourly leaderboard refresh.

use chrono::{DateTime, Utc};
use tracing::info;

use super::JobKind;
use crate::error::JobError;
use crate::leaderboard::{rank, LeaderboardSnapshot};
use crate::storage::Config;
use crate::store::{ProgressStore, UserQuery};

/// Rank the top `leaderboard.top_n` users and replace the stored snapshot.
///
/// On a query failure nothing is written and the previous snapshot stays.
pub fn refresh_leaderboard<S: ProgressStore + ?Sized>(
    store: &S,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<LeaderboardSnapshot, JobError> {
    let top_n = config.leaderboard.top_n;
    let users = store
        .query_users(&UserQuery::TopByXp { limit: top_n })
        .map_err(|source| JobError::QueryFailed {
            job: JobKind::RefreshLeaderboard.as_str(),
            source,
        })?;

    let entries = rank(&users, top_n, now);
    let mut snapshot = LeaderboardSnapshot::new(config.leaderboard.board_id.as_str(), now, entries);
    snapshot.version = store
        .write_leaderboard(&snapshot)
        .map_err(JobError::SnapshotWrite)?;

    info!(
        board = %snapshot.board_id,
        version = snapshot.version,
        entries = snapshot.entries.len(),
        "leaderboard refreshed"
    );
    Ok(snapshot)
}
