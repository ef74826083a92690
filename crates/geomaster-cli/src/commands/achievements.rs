use clap::Subcommand;
use geomaster_core::achievements::{catalog, CATALOG};
use geomaster_core::jobs;
use geomaster_core::storage::ProgressDb;
use geomaster_core::store::ProgressStore;
use serde_json::json;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// List the catalog, optionally with a user's unlock state
    List {
        #[arg(long)]
        user: Option<String>,
    },
    /// Unlock rules a user's stored progress already satisfies
    Backfill {
        uid: String,
    },
}

pub fn run(action: AchievementsAction) -> CmdResult {
    match action {
        AchievementsAction::List { user: None } => print_json(CATALOG),
        AchievementsAction::List { user: Some(uid) } => {
            let db = ProgressDb::open()?;
            let doc = db.get_user(&uid)?.ok_or_else(|| format!("no account '{uid}'"))?;
            let rows: Vec<_> = CATALOG
                .iter()
                .map(|rule| {
                    json!({
                        "id": rule.id,
                        "title": rule.title,
                        "metric": rule.metric,
                        "threshold": rule.threshold,
                        "current": rule.metric.value(&doc.progress),
                        "goal": format!("{} {}", rule.threshold, rule.metric.label()),
                        "unlocked": doc.progress.has_unlocked(rule.id),
                    })
                })
                .collect();
            print_json(&rows)
        }
        AchievementsAction::Backfill { uid } => {
            let db = ProgressDb::open()?;
            let unlocked = jobs::backfill_achievements(&db, &uid)?
                .ok_or_else(|| format!("no account '{uid}'"))?;
            let rows: Vec<_> = unlocked
                .iter()
                .filter_map(|id| catalog::find(id))
                .map(|rule| json!({ "id": rule.id, "title": rule.title }))
                .collect();
            print_json(&json!({ "userId": uid, "unlocked": rows }))
        }
    }
}
