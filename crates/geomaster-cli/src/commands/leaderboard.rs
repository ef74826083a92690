use clap::Subcommand;
use geomaster_core::storage::{Config, ProgressDb};
use geomaster_core::store::ProgressStore;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum LeaderboardAction {
    /// Show the last stored snapshot
    Show {
        /// Board id (defaults to leaderboard.board_id)
        #[arg(long)]
        board: Option<String>,
        /// Only print the first N entries
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn run(action: LeaderboardAction) -> CmdResult {
    match action {
        LeaderboardAction::Show { board, limit } => {
            let board = match board {
                Some(board) => board,
                None => Config::load()?.leaderboard.board_id,
            };
            let db = ProgressDb::open()?;
            let mut snapshot = db.read_leaderboard(&board)?.ok_or_else(|| {
                format!("no snapshot for board '{board}'; run `geomaster jobs run refresh_leaderboard`")
            })?;
            if let Some(limit) = limit {
                snapshot.entries.truncate(limit);
            }
            print_json(&snapshot)?;
        }
    }
    Ok(())
}
