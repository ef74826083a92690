use chrono::Utc;
use clap::{Args, Subcommand};
use geomaster_core::jobs::{self, ProgressOutcome};
use geomaster_core::storage::{ProgressDb, QuizRecord};
use geomaster_core::store::ProgressStore;
use serde_json::json;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Show a user's progress
    Show {
        uid: String,
    },
    /// Apply counter changes and evaluate achievements
    Update(UpdateArgs),
    /// Record a finished quiz
    Quiz {
        uid: String,
        #[arg(long)]
        region: String,
        /// Correct answers
        #[arg(long)]
        score: u32,
        #[arg(long)]
        total: u32,
        #[arg(long, default_value_t = 0)]
        xp: u64,
    },
    /// Record a newly learned country
    Learn {
        uid: String,
        /// ISO country code
        country: String,
        #[arg(long)]
        region: Option<String>,
    },
}

#[derive(Args)]
pub struct UpdateArgs {
    uid: String,
    #[arg(long, default_value_t = 0)]
    add_xp: u64,
    #[arg(long, default_value_t = 0)]
    add_quizzes: u32,
    #[arg(long, default_value_t = 0)]
    add_countries: u32,
    #[arg(long)]
    level: Option<u32>,
    #[arg(long)]
    streak: Option<u32>,
    /// Stamp the last-active date with the current time
    #[arg(long)]
    active: bool,
}

fn print_outcome(uid: &str, outcome: Option<ProgressOutcome>) -> CmdResult {
    let outcome = outcome.ok_or_else(|| format!("no account '{uid}'"))?;
    print_json(&json!({
        "userId": uid,
        "accuracy": outcome.change.after.accuracy(),
        "progress": outcome.change.after,
        "unlocked": outcome.unlocked,
    }))
}

pub fn run(action: ProgressAction) -> CmdResult {
    let db = ProgressDb::open()?;

    match action {
        ProgressAction::Show { uid } => {
            let doc = db.get_user(&uid)?.ok_or_else(|| format!("no account '{uid}'"))?;
            print_json(&doc.progress)?;
        }
        ProgressAction::Update(args) => {
            let outcome = jobs::apply_progress(&db, &args.uid, |p| {
                p.total_xp = p.total_xp.saturating_add(args.add_xp);
                p.quizzes_completed = p.quizzes_completed.saturating_add(args.add_quizzes);
                p.countries_learned = p.countries_learned.saturating_add(args.add_countries);
                if let Some(level) = args.level {
                    p.level = level.max(1);
                }
                if let Some(streak) = args.streak {
                    p.current_streak = streak;
                    p.longest_streak = p.longest_streak.max(streak);
                }
                if args.active {
                    p.record_activity(Utc::now());
                }
            })?;
            print_outcome(&args.uid, outcome)?;
        }
        ProgressAction::Quiz {
            uid,
            region,
            score,
            total,
            xp,
        } => {
            if score > total {
                return Err(format!("score {score} exceeds total {total}").into());
            }
            let outcome = jobs::apply_progress(&db, &uid, |p| {
                p.quizzes_completed = p.quizzes_completed.saturating_add(1);
                p.questions_answered = p.questions_answered.saturating_add(total);
                p.correct_answers = p.correct_answers.saturating_add(score);
                p.total_xp = p.total_xp.saturating_add(xp);
                p.record_activity(Utc::now());
            })?;
            if outcome.is_some() {
                db.record_quiz_result(
                    &uid,
                    &QuizRecord {
                        region,
                        score,
                        total_questions: total,
                        xp_earned: xp,
                        completed_at: Utc::now(),
                    },
                )?;
            }
            print_outcome(&uid, outcome)?;
        }
        ProgressAction::Learn {
            uid,
            country,
            region,
        } => {
            if db.get_user(&uid)?.is_none() {
                return Err(format!("no account '{uid}'").into());
            }
            if !db.record_learned_country(&uid, &country, Utc::now())? {
                eprintln!("{country} already learned");
                return Ok(());
            }
            let outcome = jobs::apply_progress(&db, &uid, |p| {
                p.countries_learned = p.countries_learned.saturating_add(1);
                if let Some(region) = &region {
                    let learned = p.region_progress.entry(region.clone()).or_insert(0);
                    *learned = learned.saturating_add(1);
                }
            })?;
            print_outcome(&uid, outcome)?;
        }
    }
    Ok(())
}
