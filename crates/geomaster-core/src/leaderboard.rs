//! Global leaderboard ranking.
//!
//! The leaderboard is a full-replacement snapshot: every refresh ranks the
//! population from scratch and the result overwrites the previous snapshot
//! in one write. Ties on XP are broken by user id ascending so identical
//! input always produces identical output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::progress::UserDocument;

/// Default number of ranked entries.
pub const DEFAULT_TOP_N: usize = 100;

/// Display name used for users without one.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// One ranked row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub total_xp: u64,
    pub level: u32,
    pub countries_learned: u32,
    pub snapshot_at: DateTime<Utc>,
}

/// A stored leaderboard, replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSnapshot {
    pub board_id: String,
    /// Incremented by the store on every successful write.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<LeaderboardEntry>,
}

impl LeaderboardSnapshot {
    pub fn new(
        board_id: impl Into<String>,
        updated_at: DateTime<Utc>,
        entries: Vec<LeaderboardEntry>,
    ) -> Self {
        Self {
            board_id: board_id.into(),
            version: 0,
            updated_at,
            entries,
        }
    }

    /// Entry for a user, if ranked.
    pub fn position_of(&self, user_id: &str) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.user_id == user_id)
    }
}

/// XP descending, then user id ascending.
fn compare(a: &UserDocument, b: &UserDocument) -> Ordering {
    b.progress
        .total_xp
        .cmp(&a.progress.total_xp)
        .then_with(|| a.id.cmp(&b.id))
}

fn display_name(user: &UserDocument) -> String {
    match user.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => ANONYMOUS_NAME.to_string(),
    }
}

/// Rank users by total XP and return the top `top_n` entries.
///
/// Entries carry `snapshot_at` as their timestamp. Accepts the population
/// in any order.
pub fn rank(users: &[UserDocument], top_n: usize, snapshot_at: DateTime<Utc>) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&UserDocument> = users.iter().collect();
    ordered.sort_by(|a, b| compare(a, b));

    ordered
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(index, user)| LeaderboardEntry {
            rank: index as u32 + 1,
            user_id: user.id.clone(),
            display_name: display_name(user),
            photo_url: user.photo_url.clone().filter(|url| !url.is_empty()),
            total_xp: user.progress.total_xp,
            level: user.progress.level.max(1),
            countries_learned: user.progress.countries_learned,
            snapshot_at,
        })
        .collect()
}
