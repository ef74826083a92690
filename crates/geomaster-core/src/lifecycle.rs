//! Account lifecycle hooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::progress::{Preferences, UserDocument};
use crate::store::{FieldUpdate, ProgressStore, PurgeSummary, TokenDirectory, UserUpdate};

/// Identity fields supplied by the auth provider at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Create the initial user document for a new account.
///
/// Accounts without an email are anonymous. If a document already exists
/// only its `last_login_at` is stamped; progress is left untouched.
pub fn on_account_created<S: ProgressStore + ?Sized>(
    store: &S,
    identity: &AccountIdentity,
    now: DateTime<Utc>,
) -> Result<UserDocument, StoreError> {
    if store.get_user(&identity.uid)?.is_some() {
        store.batch_update(&[UserUpdate::new(
            identity.uid.clone(),
            vec![FieldUpdate::TouchLastLogin],
        )])?;
        debug!(user_id = %identity.uid, "existing account signed in");
        return store
            .get_user(&identity.uid)?
            .ok_or_else(|| StoreError::UserNotFound(identity.uid.clone()));
    }

    let mut doc = UserDocument::new(identity.uid.clone(), now);
    doc.email = identity.email.clone().filter(|e| !e.is_empty());
    doc.display_name = identity.display_name.clone();
    doc.photo_url = identity.photo_url.clone();
    doc.is_anonymous = doc.email.is_none();
    doc.is_email_verified = identity.email_verified;

    store.put_user(&doc)?;
    info!(user_id = %doc.id, anonymous = doc.is_anonymous, "account created");
    Ok(doc)
}

/// Edit a user's preferences and store them.
///
/// Returns the stored preferences, or `None` if the user does not exist.
pub fn update_preferences<S, F>(store: &S, user_id: &str, edit: F) -> Result<Option<Preferences>, StoreError>
where
    S: ProgressStore + ?Sized,
    F: FnOnce(&mut Preferences),
{
    let Some(doc) = store.get_user(user_id)? else {
        return Ok(None);
    };
    let mut prefs = doc.preferences;
    edit(&mut prefs);
    store.batch_update(&[UserUpdate::new(
        user_id,
        vec![FieldUpdate::SetPreferences(prefs.clone())],
    )])?;
    info!(
        user_id,
        daily_reminder = prefs.daily_reminder_enabled,
        notifications = prefs.notifications_enabled,
        "preferences updated"
    );
    Ok(Some(prefs))
}

/// Purge every record belonging to a deleted account.
pub fn on_account_deleted<S>(store: &S, user_id: &str) -> Result<PurgeSummary, StoreError>
where
    S: ProgressStore + TokenDirectory + ?Sized,
{
    let mut summary = store.delete_user(user_id)?;
    // Stores that keep tokens outside the user cascade.
    if summary.device_tokens == 0 && store.remove_token(user_id)? {
        summary.device_tokens = 1;
    }
    info!(
        user_id,
        found = summary.user_found,
        achievements = summary.achievements,
        quizzes = summary.quiz_history,
        "account purged"
    );
    Ok(summary)
}
