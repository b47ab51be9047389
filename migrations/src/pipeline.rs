//! Clone-test-apply pipeline
//!
//! Validates a migration batch against a throwaway copy of the database
//! before the real apply. The clone is dropped on every exit path except
//! when creating it failed in the first place; cleanup failures are logged
//! and never override an otherwise-successful result.

use crate::adapter::DatabaseAdapter;
use crate::loader::MigrationSet;
use crate::runner::{MigrateResult, MigrationRunner, RunOptions};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Observable phase the pipeline ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    /// Clone creation failed
    Clone,
    /// Migrations failed on the clone; the real database was never touched
    Test,
    /// Migrations failed on the real database
    Apply,
    /// Everything succeeded
    Complete,
    /// Test succeeded and `test_only` skipped the real apply
    Skipped,
}

/// Pipeline options
#[derive(Debug, Clone, Default)]
pub struct CloneTestApplyOptions {
    /// Stop after the clone test; never touch the real database
    pub test_only: bool,
    pub run_options: RunOptions,
}

/// Consolidated pipeline outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneTestApplyResult {
    pub phase: PipelinePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_result: Option<MigrateResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_result: Option<MigrateResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub suggestions: Vec<String>,
    pub clone_cleaned_up: bool,
}

impl CloneTestApplyResult {
    fn new() -> Self {
        Self {
            phase: PipelinePhase::Clone,
            clone_name: None,
            clone_result: None,
            apply_result: None,
            error: None,
            suggestions: Vec::new(),
            clone_cleaned_up: false,
        }
    }
}

/// Run the full pipeline: clone, test on the clone, then apply for real
pub async fn clone_test_apply(
    db: &dyn DatabaseAdapter,
    set: &MigrationSet,
    options: &CloneTestApplyOptions,
) -> CloneTestApplyResult {
    let mut result = CloneTestApplyResult::new();
    let clone_name = format!("_mig_clone_{}", Utc::now().format("%Y%m%d%H%M%S"));

    // Phase 1: clone. Nothing exists yet on failure, so no cleanup either.
    let clone_name = match db.clone_database(&clone_name).await {
        Ok(name) => name,
        Err(err) => {
            tracing::error!(error = %err, "database clone failed");
            result.error = Some(err.to_string());
            return result;
        }
    };
    result.clone_name = Some(clone_name.clone());
    tracing::info!(clone = %clone_name, "created test clone");

    let clone_db = match db.connect_clone(&clone_name).await {
        Ok(adapter) => adapter,
        Err(err) => {
            result.error = Some(err.to_string());
            cleanup_clone(db, &clone_name, &mut result).await;
            return result;
        }
    };

    // Phase 2: test on the clone
    let test_outcome = MigrationRunner::new(clone_db.as_ref(), set)
        .with_options(options.run_options.clone())
        .run()
        .await;
    drop(clone_db);

    let test_result = match test_outcome {
        Ok(run) => run,
        Err(err) => {
            result.phase = PipelinePhase::Test;
            result.error = Some(err.to_string());
            if let Some(suggestion) =
                suggestion_for_failure(err.error_code(), &err.to_string())
            {
                result.suggestions.push(suggestion);
            }
            cleanup_clone(db, &clone_name, &mut result).await;
            return result;
        }
    };

    if !test_result.is_success() {
        result.phase = PipelinePhase::Test;
        result.error = first_failure_message(&test_result);
        result.suggestions = suggestions_for(&test_result);
        result.clone_result = Some(test_result);
        cleanup_clone(db, &clone_name, &mut result).await;
        return result;
    }

    result.clone_result = Some(test_result);
    cleanup_clone(db, &clone_name, &mut result).await;

    if options.test_only {
        result.phase = PipelinePhase::Skipped;
        return result;
    }

    // Phase 3: the real apply
    match MigrationRunner::new(db, set)
        .with_options(options.run_options.clone())
        .run()
        .await
    {
        Ok(apply) => {
            result.phase = if apply.is_success() {
                PipelinePhase::Complete
            } else {
                result.error = first_failure_message(&apply);
                PipelinePhase::Apply
            };
            result.apply_result = Some(apply);
        }
        Err(err) => {
            result.phase = PipelinePhase::Apply;
            result.error = Some(err.to_string());
        }
    }
    result
}

async fn cleanup_clone(
    db: &dyn DatabaseAdapter,
    clone_name: &str,
    result: &mut CloneTestApplyResult,
) {
    match db.drop_clone(clone_name).await {
        Ok(()) => {
            result.clone_cleaned_up = true;
        }
        Err(err) => {
            tracing::warn!(clone = %clone_name, error = %err, "failed to drop test clone");
        }
    }
}

fn first_failure_message(result: &MigrateResult) -> Option<String> {
    if result.blocked {
        return Some("blocked by dangerous operations".to_string());
    }
    result
        .results
        .iter()
        .find(|r| !r.success)
        .and_then(|r| r.error.clone())
}

fn suggestions_for(result: &MigrateResult) -> Vec<String> {
    let mut suggestions = Vec::new();
    for run in result.results.iter().filter(|r| !r.success) {
        let message = run.error.as_deref().unwrap_or_default();
        if let Some(suggestion) = suggestion_for_failure(run.error_code.as_deref(), message) {
            if !suggestions.contains(&suggestion) {
                suggestions.push(suggestion);
            }
        }
    }
    suggestions
}

/// Map a failure to a human-readable fix, preferring the SQLSTATE over
/// message matching when a code is present.
fn suggestion_for_failure(code: Option<&str>, message: &str) -> Option<String> {
    if let Some(code) = code {
        if let Some(suggestion) = suggestion_for_sqlstate(code) {
            return Some(suggestion.to_string());
        }
    }
    suggestion_for_message(message).map(String::from)
}

fn suggestion_for_sqlstate(code: &str) -> Option<&'static str> {
    match code {
        "23502" => Some(
            "NOT NULL violation: backfill existing rows (data.backfill) before adding the constraint",
        ),
        "23505" => Some(
            "Unique violation: dedup duplicate rows (data.dedup) before adding the unique constraint",
        ),
        "23503" => Some(
            "Foreign key violation: ensure referenced rows exist; consider adding the constraint as NOT VALID, then VALIDATE",
        ),
        "42P07" => Some("Table already exists: add IF NOT EXISTS to the create statement"),
        "42701" => Some("Column already exists: add IF NOT EXISTS to the add-column statement"),
        "42P01" => Some("Table not found: check the migration order"),
        "42703" => Some("Column not found: check the migration order"),
        "22P02" | "42804" => Some(
            "Type conversion failed: use USING in the ALTER, or run a transform helper first",
        ),
        _ => None,
    }
}

/// Substring fallback for drivers without error codes
fn suggestion_for_message(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("not null") || lower.contains("contains null") {
        Some("NOT NULL violation: backfill existing rows (data.backfill) before adding the constraint")
    } else if lower.contains("unique") || lower.contains("duplicate key") {
        Some("Unique violation: dedup duplicate rows (data.dedup) before adding the unique constraint")
    } else if lower.contains("foreign key") {
        Some("Foreign key violation: ensure referenced rows exist before adding the constraint")
    } else if lower.contains("already exists") {
        Some("Object already exists: add IF NOT EXISTS to the statement")
    } else if lower.contains("does not exist") {
        Some("Referenced object not found: check the migration order")
    } else if lower.contains("cast") || lower.contains("convert") {
        Some("Type conversion failed: use USING in the ALTER, or run a transform helper first")
    } else {
        None
    }
}
