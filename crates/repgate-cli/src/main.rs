use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "repgate", version, about = "Repgate CLI")]
struct Cli {
    /// Evaluate at this instant instead of now (RFC 3339, e.g. 2026-03-01T12:00:00+09:00)
    #[arg(long, global = true)]
    at: Option<DateTime<FixedOffset>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current unlock state as JSON
    Status,
    /// Workout lifecycle
    Workout {
        #[command(subcommand)]
        action: commands::workout::WorkoutAction,
    },
    /// Blocked app registry
    Apps {
        #[command(subcommand)]
        action: commands::apps::AppsAction,
    },
    /// Emergency unlocks
    Emergency {
        #[command(subcommand)]
        action: commands::emergency::EmergencyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("REPGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let now = commands::now(cli.at);
    let result = match cli.command {
        Commands::Status => commands::status(now),
        Commands::Workout { action } => commands::workout::run(action, now),
        Commands::Apps { action } => commands::apps::run(action, now),
        Commands::Emergency { action } => commands::emergency::run(action, now),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
