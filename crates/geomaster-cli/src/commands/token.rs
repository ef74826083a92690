use clap::Subcommand;
use geomaster_core::notify::fingerprint;
use geomaster_core::storage::ProgressDb;
use geomaster_core::store::{ProgressStore, TokenDirectory};

use super::CmdResult;

#[derive(Subcommand)]
pub enum TokenAction {
    /// Register a device token for push reminders
    Set {
        uid: String,
        token: String,
    },
    /// Forget a user's device token
    Remove {
        uid: String,
    },
}

pub fn run(action: TokenAction) -> CmdResult {
    let db = ProgressDb::open()?;

    match action {
        TokenAction::Set { uid, token } => {
            if db.get_user(&uid)?.is_none() {
                return Err(format!("no account '{uid}'").into());
            }
            if token.trim().is_empty() {
                return Err("token must not be empty".into());
            }
            db.set_token(&uid, token.trim())?;
            println!("token {} registered for {uid}", fingerprint(token.trim()));
        }
        TokenAction::Remove { uid } => {
            if db.remove_token(&uid)? {
                println!("token removed for {uid}");
            } else {
                println!("no token stored for {uid}");
            }
        }
    }
    Ok(())
}
