use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "geomaster", version, about = "GeoMaster progress engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account lifecycle
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },
    /// Inspect and update user progress
    Progress {
        #[command(subcommand)]
        action: commands::progress::ProgressAction,
    },
    /// Device token management
    Token {
        #[command(subcommand)]
        action: commands::token::TokenAction,
    },
    /// Run batch jobs and inspect their history
    Jobs {
        #[command(subcommand)]
        action: commands::jobs::JobsAction,
    },
    /// Leaderboard snapshots
    Leaderboard {
        #[command(subcommand)]
        action: commands::leaderboard::LeaderboardAction,
    },
    /// Achievement catalog
    Achievements {
        #[command(subcommand)]
        action: commands::achievements::AchievementsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the job scheduler until interrupted
    Serve(commands::serve::ServeArgs),
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GEOMASTER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Account { action } => commands::account::run(action),
        Commands::Progress { action } => commands::progress::run(action),
        Commands::Token { action } => commands::token::run(action),
        Commands::Jobs { action } => commands::jobs::run(action),
        Commands::Leaderboard { action } => commands::leaderboard::run(action),
        Commands::Achievements { action } => commands::achievements::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Serve(args) => commands::serve::run(args),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "geomaster", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
