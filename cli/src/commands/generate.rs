//! Generate command: diff collections against the known schema and write a
//! timestamped migration file

use crate::config::MomentumConfig;
use crate::error::CliError;
use chrono::Utc;
use colored::Colorize;
use heck::ToSnakeCase;
use momentum_migrations::{
    DangerSeverity, DatabaseSchemaSnapshot, DiffOptions, MigrationOperation, SnapshotStore,
    detect_dangers, diff_snapshots, operations_to_down_sql, operations_to_up_sql,
    snapshot_from_collections,
};
use momentum_migrations::introspect::introspect_schema;
use momentum_migrations::loader::STATEMENT_BREAKPOINT;
use serde_json::json;

pub async fn run(
    config: &MomentumConfig,
    name: Option<&str>,
    dry_run: bool,
    detect_renames: bool,
) -> Result<(), CliError> {
    let collections = config.load_collections()?;
    let desired = snapshot_from_collections(&collections, config.dialect);

    let store = SnapshotStore::new(&config.migrations_dir);
    let actual = match store.read()? {
        Some(snapshot) => snapshot,
        // No stored snapshot yet: introspect when a database is reachable,
        // otherwise start from an empty schema.
        None if config.has_database() => {
            let db = crate::db::connect(config).await?;
            introspect_schema(db.as_ref()).await?
        }
        None => DatabaseSchemaSnapshot::from_tables(config.dialect, Vec::new()),
    };

    let diff = diff_snapshots(&actual, &desired, &DiffOptions { detect_renames });
    if !diff.has_changes {
        println!("{}", "No schema changes detected.".green());
        return Ok(());
    }

    println!("{}", "Planned changes:".bright_cyan());
    for line in &diff.summary {
        println!("  {} {}", "->".bright_blue(), line);
    }
    println!();

    print_danger_report(&diff.operations, config.dialect);

    let up = operations_to_up_sql(&diff.operations, config.dialect);
    let down = operations_to_down_sql(&diff.operations, config.dialect);

    if dry_run {
        println!("{}", "Dry run - generated SQL:".bright_cyan());
        for statement in &up {
            println!("{}", statement);
        }
        return Ok(());
    }

    let slug = name.unwrap_or("migration").to_snake_case();
    let file_name = format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), slug);
    let contents = render_migration_file(&diff.operations, &up, &down);

    std::fs::create_dir_all(&config.migrations_dir)?;
    let path = config.migrations_dir.join(format!("{}.sql", file_name));
    std::fs::write(&path, contents)?;
    store.write(&desired)?;

    println!(
        "{} {}",
        "Created migration".green(),
        path.display().to_string().bright_white()
    );
    Ok(())
}

fn render_migration_file(
    operations: &[MigrationOperation],
    up: &[String],
    down: &[String],
) -> String {
    let meta = json!({
        "description": "generated from collection configs",
        "operations": operations,
    });
    let breakpoint = format!("\n{}\n", STATEMENT_BREAKPOINT);
    format!(
        "-- momentum:meta {}\n-- momentum:up\n{}\n-- momentum:down\n{}\n",
        meta,
        up.join(&breakpoint),
        down.join(&breakpoint),
    )
}

fn print_danger_report(operations: &[MigrationOperation], dialect: momentum_types::Dialect) {
    let report = detect_dangers(operations, dialect);
    if report.warnings.is_empty() {
        return;
    }
    println!("{}", "Danger report:".bright_yellow());
    for warning in &report.warnings {
        let tag = match warning.severity {
            DangerSeverity::Error => "error".red().bold(),
            DangerSeverity::Warning => "warning".yellow(),
            DangerSeverity::Info => "info".bright_blue(),
        };
        println!("  [{}] {}", tag, warning.message);
        println!("          {}", warning.suggestion.bright_black());
    }
    if report.has_errors {
        println!(
            "  {}",
            "Dangerous operations will block 'momentum run' unless overridden.".red()
        );
    }
    println!();
}
