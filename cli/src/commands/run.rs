//! Run command: apply pending migrations, clone-testing first by default

use crate::config::MomentumConfig;
use crate::error::CliError;
use colored::Colorize;
use momentum_migrations::{
    CloneTestApplyOptions, MigrateResult, MigrationRunner, MigrationSet, MigrationState,
    PipelinePhase, RunOptions, clone_test_apply,
};

pub struct RunArgs {
    pub dry_run: bool,
    pub test_only: bool,
    pub skip_clone_test: bool,
    pub allow_dangerous: bool,
}

pub async fn run(config: &MomentumConfig, args: &RunArgs) -> Result<(), CliError> {
    let set = MigrationSet::from_dir(&config.migrations_dir)?;
    if set.is_empty() {
        println!("{}", "No migrations found.".yellow());
        println!("Run 'momentum generate' to create your first migration.");
        return Ok(());
    }

    let db = crate::db::connect(config).await?;
    let runner = MigrationRunner::new(db.as_ref(), &set);

    if args.dry_run {
        let pending: Vec<String> = runner
            .status()
            .await?
            .into_iter()
            .filter(|s| s.status == MigrationState::Pending)
            .map(|s| s.name)
            .collect();
        if pending.is_empty() {
            println!("{}", "No pending migrations.".green());
        } else {
            println!("{}", "Would apply:".bright_cyan());
            for name in pending {
                println!("  {} {}", "->".bright_blue(), name);
            }
        }
        return Ok(());
    }

    let run_options = RunOptions {
        check_dangers: true,
        allow_dangerous: args.allow_dangerous,
    };

    if args.skip_clone_test {
        println!("{}", "Running migrations (clone test skipped)...".bright_cyan());
        let result = runner.with_options(run_options).run().await?;
        print_result(&result);
        return finish(&result);
    }

    println!("{}", "Running migrations with clone test...".bright_cyan());
    let result = clone_test_apply(
        db.as_ref(),
        &set,
        &CloneTestApplyOptions {
            test_only: args.test_only,
            run_options,
        },
    )
    .await;

    match result.phase {
        PipelinePhase::Clone => {
            println!(
                "{} {}",
                "Clone failed:".red(),
                result.error.as_deref().unwrap_or("unknown error")
            );
            Err(CliError::RunFailed)
        }
        PipelinePhase::Test => {
            println!("{}", "Migrations failed on the test clone:".red());
            if let Some(clone_result) = &result.clone_result {
                print_result(clone_result);
            }
            for suggestion in &result.suggestions {
                println!("  {} {}", "hint:".bright_yellow(), suggestion);
            }
            if result.clone_result.as_ref().is_some_and(|r| r.blocked) {
                Err(CliError::Blocked)
            } else {
                Err(CliError::RunFailed)
            }
        }
        PipelinePhase::Apply => {
            println!("{}", "Migrations failed on the real database:".red());
            if let Some(apply_result) = &result.apply_result {
                print_result(apply_result);
            }
            Err(CliError::RunFailed)
        }
        PipelinePhase::Skipped => {
            println!("{}", "Clone test passed; real apply skipped (--test-only).".green());
            Ok(())
        }
        PipelinePhase::Complete => {
            if let Some(apply_result) = &result.apply_result {
                print_result(apply_result);
            }
            println!("{}", "Migrations complete!".bright_green());
            Ok(())
        }
    }
}

fn print_result(result: &MigrateResult) {
    if result.blocked {
        println!("{}", "Blocked by dangerous operations:".red());
        if let Some(report) = &result.danger_report {
            for warning in &report.warnings {
                println!("  [{:?}] {}", warning.severity, warning.message);
                println!("          {}", warning.suggestion.bright_black());
            }
        }
        return;
    }
    for run in &result.results {
        if run.success {
            println!(
                "  {} {} ({} ms)",
                "ok".green(),
                run.name,
                run.execution_ms
            );
        } else {
            println!(
                "  {} {}: {}",
                "FAIL".red().bold(),
                run.name,
                run.error.as_deref().unwrap_or("unknown error")
            );
            if let Some(code) = &run.error_code {
                println!("        code: {}", code);
            }
        }
    }
}

fn finish(result: &MigrateResult) -> Result<(), CliError> {
    if result.blocked {
        Err(CliError::Blocked)
    } else if result.fail_count > 0 {
        Err(CliError::RunFailed)
    } else {
        println!("{}", "Migrations complete!".bright_green());
        Ok(())
    }
}
