use chrono::Utc;
use clap::Subcommand;
use geomaster_core::lifecycle::{
    on_account_created, on_account_deleted, update_preferences, AccountIdentity,
};
use geomaster_core::storage::ProgressDb;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Create the user document for a new account
    Create {
        /// Account uid
        uid: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long = "name")]
        display_name: Option<String>,
        #[arg(long = "photo")]
        photo_url: Option<String>,
        /// Mark the email as verified
        #[arg(long)]
        verified: bool,
    },
    /// Delete an account and everything stored for it
    Delete {
        uid: String,
    },
    /// Change reminder and notification preferences
    Preferences {
        uid: String,
        #[arg(long)]
        daily_reminder: Option<bool>,
        #[arg(long)]
        notifications: Option<bool>,
    },
}

pub fn run(action: AccountAction) -> CmdResult {
    let db = ProgressDb::open()?;

    match action {
        AccountAction::Create {
            uid,
            email,
            display_name,
            photo_url,
            verified,
        } => {
            let identity = AccountIdentity {
                uid,
                email,
                display_name,
                photo_url,
                email_verified: verified,
            };
            let doc = on_account_created(&db, &identity, Utc::now())?;
            print_json(&doc)?;
        }
        AccountAction::Delete { uid } => {
            let summary = on_account_deleted(&db, &uid)?;
            if !summary.user_found {
                eprintln!("no account '{uid}'");
            }
            print_json(&summary)?;
        }
        AccountAction::Preferences {
            uid,
            daily_reminder,
            notifications,
        } => {
            let prefs = update_preferences(&db, &uid, |p| {
                if let Some(enabled) = daily_reminder {
                    p.daily_reminder_enabled = enabled;
                }
                if let Some(enabled) = notifications {
                    p.notifications_enabled = enabled;
                }
            })?
            .ok_or_else(|| format!("no account '{uid}'"))?;
            print_json(&prefs)?;
        }
    }
    Ok(())
}
