use chrono::{DateTime, Utc};
use clap::Subcommand;
use geomaster_core::jobs::{run_job, JobKind};
use geomaster_core::notify::{self, LogGateway, NotificationGateway};
use geomaster_core::storage::{Config, ProgressDb};
use geomaster_core::store::JobLedger;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum JobsAction {
    /// Run one job now
    Run {
        /// reset_streaks, refresh_leaderboard or send_reminders
        job: String,
        /// Evaluate as of this RFC 3339 instant instead of the current time
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Log reminders instead of delivering them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recent job runs
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub fn run(action: JobsAction) -> CmdResult {
    let db = ProgressDb::open()?;

    match action {
        JobsAction::Run { job, at, dry_run } => {
            let job: JobKind = job.parse()?;
            let config = Config::load()?;
            let gateway: Box<dyn NotificationGateway> = if dry_run {
                Box::new(LogGateway::new())
            } else {
                notify::from_config(&config.reminders)?
            };
            let outcome = run_job(&db, &*gateway, &config, job, at.unwrap_or_else(Utc::now))?;
            print_json(&outcome)?;
        }
        JobsAction::History { limit } => {
            let runs = db.list_job_runs(limit)?;
            print_json(&runs)?;
        }
    }
    Ok(())
}
