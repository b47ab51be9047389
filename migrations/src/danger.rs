//! Danger detection
//!
//! Classifies an operation list by risk before anything touches the
//! database. Errors gate execution (the runner refuses to apply unless the
//! caller overrides); warnings and infos are surfaced to the operator.

use crate::operation::MigrationOperation;
use momentum_types::{Dialect, normalize_type};
use serde::{Deserialize, Serialize};

/// Risk level of a classified operation, ordered most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerSeverity {
    Error,
    Warning,
    Info,
}

/// One classified risk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DangerWarning {
    pub severity: DangerSeverity,
    pub operation: MigrationOperation,
    pub operation_index: usize,
    pub message: String,
    pub suggestion: String,
}

/// Classification result, sorted error < warning < info
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DangerReport {
    pub warnings: Vec<DangerWarning>,
    pub has_errors: bool,
}

impl DangerReport {
    /// Count of warnings at a given severity
    #[must_use]
    pub fn count(&self, severity: DangerSeverity) -> usize {
        self.warnings.iter().filter(|w| w.severity == severity).count()
    }
}

/// Classify every operation in the list
#[must_use]
pub fn detect_dangers(ops: &[MigrationOperation], dialect: Dialect) -> DangerReport {
    let mut warnings = Vec::new();

    for (index, op) in ops.iter().enumerate() {
        classify(op, index, dialect, &mut warnings);
    }

    warnings.sort_by_key(|w| w.severity);
    let has_errors = warnings.iter().any(|w| w.severity == DangerSeverity::Error);
    DangerReport {
        warnings,
        has_errors,
    }
}

fn classify(
    op: &MigrationOperation,
    index: usize,
    dialect: Dialect,
    out: &mut Vec<DangerWarning>,
) {
    let mut push = |severity, message: String, suggestion: String| {
        out.push(DangerWarning {
            severity,
            operation: op.clone(),
            operation_index: index,
            message,
            suggestion,
        });
    };

    match op {
        MigrationOperation::DropTable { table } => push(
            DangerSeverity::Error,
            format!("Dropping table \"{}\" destroys all of its rows", table),
            "Export the data first, or rename the table instead of dropping it".to_string(),
        ),
        MigrationOperation::DropColumn { table, column, .. } => push(
            DangerSeverity::Warning,
            format!("Dropping column \"{}\".\"{}\" loses its data", table, column),
            "Copy the column's data elsewhere before dropping it".to_string(),
        ),
        MigrationOperation::AddColumn {
            table,
            column,
            nullable,
            default_value,
            ..
        } => {
            if !nullable && default_value.is_none() {
                push(
                    DangerSeverity::Error,
                    format!(
                        "Adding NOT NULL column \"{}\".\"{}\" without a default fails on a non-empty table",
                        table, column
                    ),
                    "Add a DEFAULT, or add the column nullable and backfill before tightening it"
                        .to_string(),
                );
            }
        }
        MigrationOperation::AlterColumnNullable {
            table,
            column,
            nullable,
        } => {
            if !nullable {
                push(
                    DangerSeverity::Warning,
                    format!(
                        "Setting \"{}\".\"{}\" NOT NULL fails if any row holds NULL",
                        table, column
                    ),
                    "Backfill NULL values before adding the constraint (data.backfill)".to_string(),
                );
            }
        }
        MigrationOperation::AlterColumnType {
            table,
            column,
            from_type,
            to_type,
        } => {
            if !dialect.supports_column_alteration() {
                push(
                    DangerSeverity::Error,
                    format!(
                        "{} cannot change the type of \"{}\".\"{}\" in place",
                        dialect, table, column
                    ),
                    "Use the rename-column data helper to add, copy, and swap instead".to_string(),
                );
            } else {
                match classify_type_change(from_type, to_type, dialect) {
                    TypeChange::Lossy => push(
                        DangerSeverity::Warning,
                        format!(
                            "Converting \"{}\".\"{}\" from {} to {} may lose data",
                            table, column, from_type, to_type
                        ),
                        "Run a transform first, or use USING to control the conversion".to_string(),
                    ),
                    TypeChange::Rewrite => push(
                        DangerSeverity::Info,
                        format!(
                            "Converting \"{}\".\"{}\" from {} to {} rewrites the table",
                            table, column, from_type, to_type
                        ),
                        "Expect the statement to be slow on large tables".to_string(),
                    ),
                    TypeChange::Safe => {}
                }
            }
        }
        MigrationOperation::RenameColumn { table, from, to } => push(
            DangerSeverity::Warning,
            format!(
                "Renaming \"{}\".\"{}\" to \"{}\" may break queries that use the old name",
                table, from, to
            ),
            "Update every caller that references the old column name".to_string(),
        ),
        MigrationOperation::RenameTable { from, to } => push(
            DangerSeverity::Warning,
            format!("Renaming table \"{}\" to \"{}\" may break callers", from, to),
            "Update every caller that references the old table name".to_string(),
        ),
        MigrationOperation::AddForeignKey {
            table,
            constraint_name,
            ..
        } => {
            if dialect == Dialect::PostgreSQL {
                push(
                    DangerSeverity::Info,
                    format!(
                        "Adding constraint \"{}\" takes an ACCESS EXCLUSIVE lock on \"{}\"",
                        constraint_name, table
                    ),
                    "Consider adding the constraint as NOT VALID and validating afterwards"
                        .to_string(),
                );
            }
        }
        MigrationOperation::CreateIndex {
            table, index_name, ..
        } => {
            if dialect == Dialect::PostgreSQL {
                push(
                    DangerSeverity::Info,
                    format!(
                        "Building index \"{}\" blocks writes to \"{}\" for the duration",
                        index_name, table
                    ),
                    "Use CREATE INDEX CONCURRENTLY outside a transaction for large tables"
                        .to_string(),
                );
            }
        }
        MigrationOperation::DropForeignKey { .. }
        | MigrationOperation::DropIndex { .. }
        | MigrationOperation::AlterColumnDefault { .. }
        | MigrationOperation::RawSql { .. }
        | MigrationOperation::CreateTable { .. } => {}
    }
}

enum TypeChange {
    Lossy,
    Rewrite,
    Safe,
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum TypeFamily {
    Textual,
    Numeric,
    Temporal,
    Boolean,
    Json,
    Other,
}

fn family(normalized: &str) -> TypeFamily {
    let base = normalized.split('(').next().unwrap_or(normalized);
    match base {
        "TEXT" | "VARCHAR" | "CHAR" | "CHARACTER" => TypeFamily::Textual,
        "SMALLINT" | "INTEGER" | "BIGINT" | "NUMERIC" | "DECIMAL" | "REAL" | "DOUBLE"
        | "FLOAT" => TypeFamily::Numeric,
        "DATE" | "TIME" | "TIMESTAMP" | "TIMESTAMPTZ" => TypeFamily::Temporal,
        "BOOLEAN" => TypeFamily::Boolean,
        "JSON" | "JSONB" => TypeFamily::Json,
        _ => TypeFamily::Other,
    }
}

/// Width rank used for narrowing detection; bigger holds more
fn numeric_rank(normalized: &str) -> Option<u8> {
    match normalized {
        "SMALLINT" => Some(1),
        "INTEGER" => Some(2),
        "BIGINT" => Some(3),
        "REAL" | "FLOAT" => Some(4),
        "DOUBLE" => Some(5),
        "NUMERIC" | "DECIMAL" => Some(6),
        _ => None,
    }
}

fn varchar_len(normalized: &str) -> Option<u32> {
    let rest = normalized.strip_prefix("VARCHAR(")?;
    rest.strip_suffix(')')?.parse().ok()
}

fn classify_type_change(from: &str, to: &str, dialect: Dialect) -> TypeChange {
    let from = normalize_type(from, dialect);
    let to = normalize_type(to, dialect);
    let from_family = family(&from);
    let to_family = family(&to);

    if from_family == TypeFamily::Textual && to_family == TypeFamily::Numeric {
        return TypeChange::Lossy;
    }
    if from_family == TypeFamily::Numeric && to_family == TypeFamily::Numeric {
        if let (Some(from_rank), Some(to_rank)) = (numeric_rank(&from), numeric_rank(&to)) {
            if to_rank < from_rank {
                return TypeChange::Lossy;
            }
        }
        return TypeChange::Safe;
    }
    if let (Some(from_len), Some(to_len)) = (varchar_len(&from), varchar_len(&to)) {
        if to_len < from_len {
            return TypeChange::Lossy;
        }
    }
    if from.starts_with("TIMESTAMP") && to == "DATE" {
        return TypeChange::Lossy;
    }

    if from_family != to_family {
        return TypeChange::Rewrite;
    }
    TypeChange::Safe
}
