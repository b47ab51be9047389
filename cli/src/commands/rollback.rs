//! Rollback command: revert the latest batch

use crate::config::MomentumConfig;
use crate::error::CliError;
use colored::Colorize;
use momentum_migrations::{MigrationRunner, MigrationSet};

pub async fn run(config: &MomentumConfig) -> Result<(), CliError> {
    let set = MigrationSet::from_dir(&config.migrations_dir)?;
    let db = crate::db::connect(config).await?;

    println!("{}", "Rolling back the latest batch...".bright_cyan());
    let result = MigrationRunner::new(db.as_ref(), &set)
        .rollback_latest_batch()
        .await?;

    if result.results.is_empty() {
        println!("  {}", "Nothing to roll back.".yellow());
        return Ok(());
    }

    for run in &result.results {
        if run.success {
            println!("  {} {}", "reverted".green(), run.name);
        } else {
            println!(
                "  {} {}: {}",
                "FAIL".red().bold(),
                run.name,
                run.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if result.fail_count > 0 {
        Err(CliError::RunFailed)
    } else {
        println!("{}", "Rollback complete!".bright_green());
        Ok(())
    }
}
