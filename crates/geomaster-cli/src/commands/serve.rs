//! Scheduler daemon: sleeps until the next fire time and runs the due jobs
//! on blocking workers.

use chrono::{DateTime, Utc};
use clap::Args;
use geomaster_core::jobs::{run_job, JobKind, JobOutcome};
use geomaster_core::notify::{self, LogGateway, NotificationGateway};
use geomaster_core::storage::{Config, ProgressDb};
use geomaster_core::{CoreError, Scheduler};
use tokio::runtime::Builder;
use tracing::{error, info};

use super::CmdResult;

#[derive(Args)]
pub struct ServeArgs {
    /// Log reminders instead of delivering them
    #[arg(long)]
    dry_run: bool,
    /// Print the upcoming plan and exit
    #[arg(long)]
    plan: bool,
}

pub fn run(args: ServeArgs) -> CmdResult {
    let config = Config::load()?;
    let scheduler = Scheduler::from_config(&config.schedule);

    if args.plan {
        for (job, schedule) in scheduler.entries() {
            let next = schedule.next_after(Utc::now());
            println!("{job:<20} {:<24} next {}", schedule.describe(), next.to_rfc3339());
        }
        return Ok(());
    }

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(serve(config, scheduler, args.dry_run))
}

async fn serve(config: Config, scheduler: Scheduler, dry_run: bool) -> CmdResult {
    for (job, schedule) in scheduler.entries() {
        info!(job = job.as_str(), schedule = %schedule.describe(), "scheduled");
    }

    loop {
        let now = Utc::now();
        let Some(plan) = scheduler.next_run(now) else {
            info!("nothing scheduled");
            return Ok(());
        };
        let wait = (plan.at - now).to_std().unwrap_or_default();
        info!(at = %plan.at, jobs = ?plan.jobs, "waiting for next run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                return Ok(());
            }
        }

        // Due jobs run in order; a failed job does not stop the next one.
        for job in plan.jobs {
            let config = config.clone();
            let at = plan.at;
            let handle =
                tokio::task::spawn_blocking(move || run_scheduled(&config, job, at, dry_run));
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(job = job.as_str(), "scheduled run failed: {e}"),
                Err(e) => error!(job = job.as_str(), "job worker panicked: {e}"),
            }
        }
    }
}

/// Opens its own connection; nothing is shared across runs.
fn run_scheduled(
    config: &Config,
    job: JobKind,
    at: DateTime<Utc>,
    dry_run: bool,
) -> Result<JobOutcome, CoreError> {
    let db = ProgressDb::open()?;
    let gateway: Box<dyn NotificationGateway> = if dry_run {
        Box::new(LogGateway::new())
    } else {
        notify::from_config(&config.reminders)?
    };
    Ok(run_job(&db, &*gateway, config, job, at)?)
}
