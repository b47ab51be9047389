//! Status command: merged view of migration files and the ledger

use crate::config::MomentumConfig;
use crate::error::CliError;
use colored::Colorize;
use momentum_migrations::{MigrationRunner, MigrationSet, MigrationState};

pub async fn run(config: &MomentumConfig) -> Result<(), CliError> {
    let set = MigrationSet::from_dir(&config.migrations_dir)?;
    if set.is_empty() {
        println!("{}", "No migrations found.".yellow());
        return Ok(());
    }

    let db = crate::db::connect(config).await?;
    let statuses = MigrationRunner::new(db.as_ref(), &set).status().await?;

    let mut pending = 0usize;
    for status in &statuses {
        match status.status {
            MigrationState::Applied => println!(
                "  {} {} (batch {}, {})",
                "applied".green(),
                status.name,
                status.batch.unwrap_or(0),
                status.applied_at.as_deref().unwrap_or("-")
            ),
            MigrationState::Pending => {
                pending += 1;
                println!("  {} {}", "pending".yellow(), status.name);
            }
        }
    }

    println!();
    if pending == 0 {
        println!("{}", "Database is up to date.".green());
    } else {
        println!("{} {} pending migration(s)", "->".bright_blue(), pending);
    }
    Ok(())
}
