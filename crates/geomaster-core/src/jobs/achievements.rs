//! Achievement trigger on progress writes.

use tracing::info;

use crate::achievements::RuleSet;
use crate::error::StoreError;
use crate::progress::{ProgressChange, UserProgress};
use crate::store::{FieldUpdate, ProgressStore, UserUpdate};

/// Result of [`apply_progress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressOutcome {
    /// `after` includes the ids unlocked by this write.
    pub change: ProgressChange,
    pub unlocked: Vec<&'static str>,
}

/// Evaluate the rule set against a completed write and persist any new
/// unlocks with a set union. Returns the newly unlocked ids.
///
/// Concurrent triggers for the same user may both report an id; the union
/// keeps the stored set correct.
pub fn on_progress_written<S: ProgressStore + ?Sized>(
    store: &S,
    user_id: &str,
    change: &ProgressChange,
) -> Result<Vec<&'static str>, StoreError> {
    let unlocked = RuleSet::default().evaluate(
        &change.before,
        &change.after,
        &change.after.unlocked_achievements,
    );
    if unlocked.is_empty() {
        return Ok(unlocked);
    }

    let ids = unlocked.iter().map(|id| id.to_string()).collect();
    store.batch_update(&[UserUpdate::new(user_id, vec![FieldUpdate::UnionAchievements(ids)])])?;
    info!(user_id, achievements = ?unlocked, "achievements unlocked");
    Ok(unlocked)
}

/// Unlock every rule the stored progress already satisfies but never
/// crossed, such as rules added after the counters were written.
///
/// Returns `None` if the user does not exist.
pub fn backfill_achievements<S: ProgressStore + ?Sized>(
    store: &S,
    user_id: &str,
) -> Result<Option<Vec<&'static str>>, StoreError> {
    let Some(doc) = store.get_user(user_id)? else {
        return Ok(None);
    };
    let missing = RuleSet::default().missing(&doc.progress);
    if !missing.is_empty() {
        let ids = missing.iter().map(|id| id.to_string()).collect();
        store.batch_update(&[UserUpdate::new(user_id, vec![FieldUpdate::UnionAchievements(ids)])])?;
        info!(user_id, achievements = ?missing, "achievements backfilled");
    }
    Ok(Some(missing))
}

/// Read-modify-write one user's progress, then run the trigger.
///
/// Returns `None` if the user does not exist.
pub fn apply_progress<S, F>(store: &S, user_id: &str, mut edit: F) -> Result<Option<ProgressOutcome>, StoreError>
where
    S: ProgressStore + ?Sized,
    F: FnMut(&mut UserProgress),
{
    let Some(mut change) = store.modify_progress(user_id, &mut edit)? else {
        return Ok(None);
    };
    let unlocked = on_progress_written(store, user_id, &change)?;
    change
        .after
        .unlocked_achievements
        .extend(unlocked.iter().map(|id| id.to_string()));
    Ok(Some(ProgressOutcome { change, unlocked }))
}
