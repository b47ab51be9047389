//! momentum - migration CLI
//!
//! Four commands over a `momentum.toml` config: generate, run, status,
//! rollback. Everything interesting lives in `momentum-migrations`; this
//! binary is argument parsing and output.

mod commands;
mod config;
mod db;
mod error;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::MomentumConfig;
use error::CliError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "momentum", version, about = "Schema migrations for collection configs")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = "momentum.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a migration from the collection configs
    Generate {
        /// Name suffix for the migration file
        #[arg(long)]
        name: Option<String>,
        /// Print the SQL without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Disable the column-rename heuristic
        #[arg(long)]
        no_detect_renames: bool,
    },
    /// Apply pending migrations
    Run {
        /// List pending migrations without applying
        #[arg(long)]
        dry_run: bool,
        /// Validate on a clone, then stop before the real apply
        #[arg(long)]
        test_only: bool,
        /// Apply directly without the clone rehearsal
        #[arg(long)]
        skip_clone_test: bool,
        /// Apply even when the danger report contains errors
        #[arg(long)]
        allow_dangerous: bool,
    },
    /// Show applied and pending migrations
    Status,
    /// Roll back the latest batch
    Rollback,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = MomentumConfig::load(&cli.config)?;

    match cli.command {
        Command::Generate {
            name,
            dry_run,
            no_detect_renames,
        } => {
            commands::generate::run(&config, name.as_deref(), dry_run, !no_detect_renames).await
        }
        Command::Run {
            dry_run,
            test_only,
            skip_clone_test,
            allow_dangerous,
        } => {
            commands::run::run(
                &config,
                &commands::run::RunArgs {
                    dry_run,
                    test_only,
                    skip_clone_test,
                    allow_dangerous,
                },
            )
            .await
        }
        Command::Status => commands::status::run(&config).await,
        Command::Rollback => commands::rollback::run(&config).await,
    }
}
