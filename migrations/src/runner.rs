//! Migration runner
//!
//! Applies pending migrations forward and rolls back the latest batch.
//! Execution failures never escape as errors: each migration produces a
//! structured [`MigrationRunResult`], and the pass stops at the first
//! failure. Each migration's work plus its tracker write runs inside one
//! transaction so a crash cannot leave a half-applied row.

use crate::adapter::DatabaseAdapter;
use crate::context::MigrationContext;
use crate::danger::{DangerReport, detect_dangers};
use crate::error::{MigrateError, Result};
use crate::loader::{MigrationScript, MigrationSet};
use crate::operation::MigrationOperation;
use crate::snapshot::sha256_hex;
use crate::tracker::MigrationTracker;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Runner behavior switches
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run the danger detector over declared operations before applying
    pub check_dangers: bool,
    /// Apply even when the danger report contains errors
    pub allow_dangerous: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check_dangers: true,
            allow_dangerous: false,
        }
    }
}

/// Outcome of one migration within a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRunResult {
    pub name: String,
    pub success: bool,
    pub execution_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// SQLSTATE for PostgreSQL, extended result code for SQLite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Outcome of a forward or rollback pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateResult {
    pub success_count: usize,
    pub fail_count: usize,
    pub results: Vec<MigrationRunResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub danger_report: Option<DangerReport>,
    /// True when the danger gate refused to run anything
    #[serde(default)]
    pub blocked: bool,
}

impl MigrateResult {
    /// Whether every migration in the pass succeeded and nothing blocked
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.blocked && self.fail_count == 0
    }
}

/// Apply state of one known migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    Applied,
    Pending,
}

/// One row of the status listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub name: String,
    pub status: MigrationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
}

/// Runs a migration set against one database
pub struct MigrationRunner<'a> {
    db: &'a dyn DatabaseAdapter,
    set: &'a MigrationSet,
    options: RunOptions,
}

impl<'a> MigrationRunner<'a> {
    #[must_use]
    pub fn new(db: &'a dyn DatabaseAdapter, set: &'a MigrationSet) -> Self {
        Self {
            db,
            set,
            options: RunOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Apply every pending migration in file order
    pub async fn run(&self) -> Result<MigrateResult> {
        let tracker = MigrationTracker::new(self.db);
        tracker.ensure_tracking_table().await?;

        let applied: HashSet<String> = tracker
            .applied_migrations()
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect();
        let pending: Vec<_> = self
            .set
            .iter()
            .filter(|m| !applied.contains(&m.meta().name))
            .collect();

        let mut result = MigrateResult::default();
        if pending.is_empty() {
            return Ok(result);
        }

        // Danger gate over the union of declared operations
        if self.options.check_dangers {
            let declared: Vec<MigrationOperation> = pending
                .iter()
                .filter_map(|m| m.meta().operations.as_ref())
                .flatten()
                .cloned()
                .collect();
            if !declared.is_empty() {
                let report = detect_dangers(&declared, self.db.dialect());
                if report.has_errors && !self.options.allow_dangerous {
                    tracing::warn!(
                        errors = report.count(crate::danger::DangerSeverity::Error),
                        "dangerous operations detected - refusing to run"
                    );
                    result.danger_report = Some(report);
                    result.blocked = true;
                    return Ok(result);
                }
                result.danger_report = Some(report);
            }
        }

        let batch = tracker.next_batch_number().await?;
        let ctx = MigrationContext::new(self.db);

        for migration in pending {
            let name = migration.meta().name.clone();
            tracing::info!(migration = %name, batch, "applying");
            let started = Instant::now();

            let outcome = self.apply_one(&tracker, &ctx, migration.as_ref(), batch).await;
            let execution_ms = started.elapsed().as_millis() as i64;

            match outcome {
                Ok(()) => {
                    result.success_count += 1;
                    result.results.push(MigrationRunResult {
                        name,
                        success: true,
                        execution_ms,
                        error: None,
                        error_code: None,
                    });
                }
                Err(err) => {
                    tracing::error!(migration = %name, error = %err, "migration failed");
                    result.fail_count += 1;
                    result.results.push(failure_result(name, execution_ms, &err));
                    break;
                }
            }
        }

        Ok(result)
    }

    async fn apply_one(
        &self,
        tracker: &MigrationTracker<'_>,
        ctx: &MigrationContext<'_>,
        migration: &dyn MigrationScript,
        batch: i64,
    ) -> Result<()> {
        let started = Instant::now();
        self.db.execute_raw("BEGIN", &[]).await?;

        let applied = async {
            migration.up(ctx).await?;
            let checksum = script_checksum(migration)?;
            tracker
                .record_migration(
                    &migration.meta().name,
                    batch,
                    &checksum,
                    started.elapsed().as_millis() as i64,
                )
                .await?;
            Ok::<(), MigrateError>(())
        }
        .await;

        match applied {
            Ok(()) => {
                self.db.execute_raw("COMMIT", &[]).await?;
                Ok(())
            }
            Err(err) => {
                // Rollback failures are secondary; the original error wins
                let _ = self.db.execute_raw("ROLLBACK", &[]).await;
                Err(err)
            }
        }
    }

    /// Roll back every migration of the latest batch, newest name first
    pub async fn rollback_latest_batch(&self) -> Result<MigrateResult> {
        let tracker = MigrationTracker::new(self.db);
        tracker.ensure_tracking_table().await?;

        let mut result = MigrateResult::default();
        let batch = tracker.latest_batch_number().await?;
        if batch == 0 {
            return Ok(result);
        }

        let ctx = MigrationContext::new(self.db);
        for record in tracker.migrations_by_batch(batch).await? {
            let Some(migration) = self.set.get(&record.name) else {
                result.fail_count += 1;
                result.results.push(failure_result(
                    record.name.clone(),
                    0,
                    &MigrateError::MissingMigration(record.name.clone()),
                ));
                break;
            };

            tracing::info!(migration = %record.name, batch, "rolling back");
            let started = Instant::now();
            let outcome = self.revert_one(&tracker, &ctx, migration.as_ref()).await;
            let execution_ms = started.elapsed().as_millis() as i64;

            match outcome {
                Ok(()) => {
                    result.success_count += 1;
                    result.results.push(MigrationRunResult {
                        name: record.name,
                        success: true,
                        execution_ms,
                        error: None,
                        error_code: None,
                    });
                }
                Err(err) => {
                    tracing::error!(migration = %record.name, error = %err, "rollback failed");
                    result.fail_count += 1;
                    result.results.push(failure_result(record.name, execution_ms, &err));
                    break;
                }
            }
        }

        Ok(result)
    }

    async fn revert_one(
        &self,
        tracker: &MigrationTracker<'_>,
        ctx: &MigrationContext<'_>,
        migration: &dyn MigrationScript,
    ) -> Result<()> {
        self.db.execute_raw("BEGIN", &[]).await?;

        let reverted = async {
            migration.down(ctx).await?;
            tracker.remove_migration_record(&migration.meta().name).await?;
            Ok::<(), MigrateError>(())
        }
        .await;

        match reverted {
            Ok(()) => {
                self.db.execute_raw("COMMIT", &[]).await?;
                Ok(())
            }
            Err(err) => {
                let _ = self.db.execute_raw("ROLLBACK", &[]).await;
                Err(err)
            }
        }
    }

    /// Merge the migration set with the ledger, in file order
    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let tracker = MigrationTracker::new(self.db);
        tracker.ensure_tracking_table().await?;

        let applied: HashMap<String, crate::tracker::MigrationTrackingRecord> = tracker
            .applied_migrations()
            .await?
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        Ok(self
            .set
            .iter()
            .map(|m| {
                let name = m.meta().name.clone();
                match applied.get(&name) {
                    Some(record) => MigrationStatus {
                        name,
                        status: MigrationState::Applied,
                        batch: Some(record.batch),
                        applied_at: Some(record.applied_at.clone()),
                    },
                    None => MigrationStatus {
                        name,
                        status: MigrationState::Pending,
                        batch: None,
                        applied_at: None,
                    },
                }
            })
            .collect())
    }
}

/// Tracker checksum input: the meta JSON followed by the stable revision
fn script_checksum(migration: &dyn MigrationScript) -> Result<String> {
    let meta_json = serde_json::to_string(migration.meta())?;
    Ok(sha256_hex(
        format!("{}{}", meta_json, migration.revision()).as_bytes(),
    ))
}

fn failure_result(name: String, execution_ms: i64, err: &MigrateError) -> MigrationRunResult {
    MigrationRunResult {
        name,
        success: false,
        execution_ms,
        error: Some(err.to_string()),
        error_code: err.error_code().map(String::from),
    }
}
