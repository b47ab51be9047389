//! Schema diff engine
//!
//! Compares an actual snapshot (introspected) against a desired snapshot
//! (built from collections) and emits the ordered operation list that
//! transforms one into the other. Tables are handled created-first, then
//! dropped, then altered; within an altered table: columns, foreign keys,
//! indexes.

use crate::operation::{ColumnDef, MigrationOperation};
use crate::snapshot::{ColumnSnapshot, DatabaseSchemaSnapshot, TableSnapshot};
use momentum_types::{Dialect, are_types_compatible};
use std::collections::{HashMap, HashSet};

/// Diff behavior switches
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Map add+drop pairs of compatible type into `renameColumn` (on by default)
    pub detect_renames: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            detect_renames: true,
        }
    }
}

/// Result of diffing two snapshots
#[derive(Debug, Clone)]
pub struct SchemaDiffResult {
    pub has_changes: bool,
    pub operations: Vec<MigrationOperation>,
    /// One human-readable line per operation, index-parallel
    pub summary: Vec<String>,
}

/// Compute the operations that transform `actual` into `desired`
#[must_use]
pub fn diff_snapshots(
    actual: &DatabaseSchemaSnapshot,
    desired: &DatabaseSchemaSnapshot,
    options: &DiffOptions,
) -> SchemaDiffResult {
    let dialect = desired.dialect;
    let actual_by_name: HashMap<&str, &TableSnapshot> =
        actual.tables.iter().map(|t| (t.name.as_str(), t)).collect();
    let desired_by_name: HashMap<&str, &TableSnapshot> =
        desired.tables.iter().map(|t| (t.name.as_str(), t)).collect();

    let mut operations = Vec::new();

    // New tables, with their constraints and indexes
    for table in &desired.tables {
        if actual_by_name.contains_key(table.name.as_str()) {
            continue;
        }
        operations.push(MigrationOperation::CreateTable {
            table: table.name.clone(),
            columns: table.columns.iter().map(column_def).collect(),
        });
        for fk in &table.foreign_keys {
            operations.push(MigrationOperation::AddForeignKey {
                table: table.name.clone(),
                constraint_name: fk.constraint_name.clone(),
                column: fk.column.clone(),
                referenced_table: fk.referenced_table.clone(),
                referenced_column: fk.referenced_column.clone(),
                on_delete: fk.on_delete,
            });
        }
        for index in &table.indexes {
            operations.push(MigrationOperation::CreateIndex {
                table: table.name.clone(),
                index_name: index.name.clone(),
                columns: index.columns.clone(),
                unique: index.unique,
            });
        }
    }

    // Removed tables
    for table in &actual.tables {
        if !desired_by_name.contains_key(table.name.as_str()) {
            operations.push(MigrationOperation::DropTable {
                table: table.name.clone(),
            });
        }
    }

    // Altered tables: columns, then foreign keys, then indexes
    for desired_table in &desired.tables {
        let Some(actual_table) = actual_by_name.get(desired_table.name.as_str()) else {
            continue;
        };
        diff_columns(actual_table, desired_table, dialect, options, &mut operations);
        diff_foreign_keys(actual_table, desired_table, &mut operations);
        diff_indexes(actual_table, desired_table, &mut operations);
    }

    let summary = operations.iter().map(MigrationOperation::summary).collect();
    SchemaDiffResult {
        has_changes: !operations.is_empty(),
        operations,
        summary,
    }
}

fn column_def(column: &ColumnSnapshot) -> ColumnDef {
    ColumnDef {
        name: column.name.clone(),
        column_type: column.column_type.clone(),
        nullable: column.nullable,
        default_value: column.default_value.clone(),
        primary_key: column.is_primary_key,
    }
}

fn diff_columns(
    actual: &TableSnapshot,
    desired: &TableSnapshot,
    dialect: Dialect,
    options: &DiffOptions,
    operations: &mut Vec<MigrationOperation>,
) {
    let actual_by_name: HashMap<&str, &ColumnSnapshot> =
        actual.columns.iter().map(|c| (c.name.as_str(), c)).collect();
    let desired_by_name: HashMap<&str, &ColumnSnapshot> =
        desired.columns.iter().map(|c| (c.name.as_str(), c)).collect();

    let missing: Vec<&ColumnSnapshot> = desired
        .columns
        .iter()
        .filter(|c| !actual_by_name.contains_key(c.name.as_str()))
        .collect();
    let extra: Vec<&ColumnSnapshot> = actual
        .columns
        .iter()
        .filter(|c| !desired_by_name.contains_key(c.name.as_str()))
        .collect();

    // Rename heuristic: pair each missing column with the first unconsumed
    // extra column of a compatible type.
    let mut renamed_to: HashMap<&str, &str> = HashMap::new();
    let mut consumed: HashSet<&str> = HashSet::new();
    if options.detect_renames {
        for new in &missing {
            for old in &extra {
                if consumed.contains(old.name.as_str()) {
                    continue;
                }
                if are_types_compatible(&old.column_type, &new.column_type, dialect) {
                    consumed.insert(old.name.as_str());
                    renamed_to.insert(new.name.as_str(), old.name.as_str());
                    operations.push(MigrationOperation::RenameColumn {
                        table: desired.name.clone(),
                        from: old.name.clone(),
                        to: new.name.clone(),
                    });
                    break;
                }
            }
        }
    }

    for column in &missing {
        if renamed_to.contains_key(column.name.as_str()) {
            continue;
        }
        operations.push(MigrationOperation::AddColumn {
            table: desired.name.clone(),
            column: column.name.clone(),
            column_type: column.column_type.clone(),
            nullable: column.nullable,
            default_value: column.default_value.clone(),
        });
    }

    for column in &extra {
        if consumed.contains(column.name.as_str()) {
            continue;
        }
        operations.push(MigrationOperation::DropColumn {
            table: desired.name.clone(),
            column: column.name.clone(),
            previous_type: column.column_type.clone(),
            previous_nullable: column.nullable,
        });
    }

    // Columns present on both sides
    for desired_col in &desired.columns {
        let Some(actual_col) = actual_by_name.get(desired_col.name.as_str()) else {
            continue;
        };

        if !are_types_compatible(&actual_col.column_type, &desired_col.column_type, dialect) {
            operations.push(MigrationOperation::AlterColumnType {
                table: desired.name.clone(),
                column: desired_col.name.clone(),
                from_type: actual_col.column_type.clone(),
                to_type: desired_col.column_type.clone(),
            });
        }

        if actual_col.nullable != desired_col.nullable {
            operations.push(MigrationOperation::AlterColumnNullable {
                table: desired.name.clone(),
                column: desired_col.name.clone(),
                nullable: desired_col.nullable,
            });
        }

        let actual_default = normalize_default(actual_col.default_value.as_deref());
        let desired_default = normalize_default(desired_col.default_value.as_deref());
        if actual_default != desired_default {
            operations.push(MigrationOperation::AlterColumnDefault {
                table: desired.name.clone(),
                column: desired_col.name.clone(),
                default_value: desired_col.default_value.clone(),
                previous_default: actual_col.default_value.clone(),
            });
        }
    }
}

/// Collapse absent/empty defaults to `None` and strip the `::type` cast
/// PostgreSQL appends to stored default expressions.
fn normalize_default(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    let stripped = match value.rfind("::") {
        Some(pos) if !value[..pos].is_empty() => value[..pos].trim_end(),
        _ => value,
    };
    Some(stripped.to_string())
}

fn diff_foreign_keys(
    actual: &TableSnapshot,
    desired: &TableSnapshot,
    operations: &mut Vec<MigrationOperation>,
) {
    let actual_by_name: HashMap<&str, &crate::snapshot::ForeignKeySnapshot> = actual
        .foreign_keys
        .iter()
        .map(|fk| (fk.constraint_name.as_str(), fk))
        .collect();
    let desired_by_name: HashMap<&str, &crate::snapshot::ForeignKeySnapshot> = desired
        .foreign_keys
        .iter()
        .map(|fk| (fk.constraint_name.as_str(), fk))
        .collect();

    for fk in &actual.foreign_keys {
        if !desired_by_name.contains_key(fk.constraint_name.as_str()) {
            operations.push(MigrationOperation::DropForeignKey {
                table: desired.name.clone(),
                constraint_name: fk.constraint_name.clone(),
            });
        }
    }

    for fk in &desired.foreign_keys {
        match actual_by_name.get(fk.constraint_name.as_str()) {
            None => operations.push(add_foreign_key(&desired.name, fk)),
            // No in-place ALTER for FKs: replace when anything differs
            Some(existing) if *existing != fk => {
                operations.push(MigrationOperation::DropForeignKey {
                    table: desired.name.clone(),
                    constraint_name: fk.constraint_name.clone(),
                });
                operations.push(add_foreign_key(&desired.name, fk));
            }
            Some(_) => {}
        }
    }
}

fn add_foreign_key(
    table: &str,
    fk: &crate::snapshot::ForeignKeySnapshot,
) -> MigrationOperation {
    MigrationOperation::AddForeignKey {
        table: table.to_string(),
        constraint_name: fk.constraint_name.clone(),
        column: fk.column.clone(),
        referenced_table: fk.referenced_table.clone(),
        referenced_column: fk.referenced_column.clone(),
        on_delete: fk.on_delete,
    }
}

fn diff_indexes(
    actual: &TableSnapshot,
    desired: &TableSnapshot,
    operations: &mut Vec<MigrationOperation>,
) {
    let actual_by_name: HashMap<&str, &crate::snapshot::IndexSnapshot> = actual
        .indexes
        .iter()
        .map(|i| (i.name.as_str(), i))
        .collect();
    let desired_by_name: HashMap<&str, &crate::snapshot::IndexSnapshot> = desired
        .indexes
        .iter()
        .map(|i| (i.name.as_str(), i))
        .collect();

    for index in &actual.indexes {
        if !desired_by_name.contains_key(index.name.as_str()) {
            operations.push(MigrationOperation::DropIndex {
                table: desired.name.clone(),
                index_name: index.name.clone(),
            });
        }
    }

    for index in &desired.indexes {
        match actual_by_name.get(index.name.as_str()) {
            None => operations.push(create_index(&desired.name, index)),
            Some(existing)
                if existing.unique != index.unique || existing.columns != index.columns =>
            {
                operations.push(MigrationOperation::DropIndex {
                    table: desired.name.clone(),
                    index_name: index.name.clone(),
                });
                operations.push(create_index(&desired.name, index));
            }
            Some(_) => {}
        }
    }
}

fn create_index(table: &str, index: &crate::snapshot::IndexSnapshot) -> MigrationOperation {
    MigrationOperation::CreateIndex {
        table: table.to_string(),
        index_name: index.name.clone(),
        columns: index.columns.clone(),
        unique: index.unique,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ForeignKeyAction, ForeignKeySnapshot, IndexSnapshot};

    fn column(name: &str, ty: &str, nullable: bool) -> ColumnSnapshot {
        ColumnSnapshot {
            name: name.to_string(),
            column_type: ty.to_string(),
            nullable,
            default_value: None,
            is_primary_key: false,
        }
    }

    fn table(name: &str, columns: Vec<ColumnSnapshot>) -> TableSnapshot {
        TableSnapshot {
            name: name.to_string(),
            columns,
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn snapshot(tables: Vec<TableSnapshot>) -> DatabaseSchemaSnapshot {
        DatabaseSchemaSnapshot::from_tables(Dialect::PostgreSQL, tables)
    }

    #[test]
    fn test_diff_is_idempotent() {
        let s = snapshot(vec![table(
            "posts",
            vec![column("id", "VARCHAR(36)", false), column("title", "TEXT", false)],
        )]);
        let result = diff_snapshots(&s, &s, &DiffOptions::default());
        assert!(!result.has_changes);
        assert!(result.operations.is_empty());
        assert!(result.summary.is_empty());
    }

    #[test]
    fn test_create_table_with_fks_and_indexes() {
        let actual = snapshot(vec![]);
        let mut posts = table(
            "posts",
            vec![column("id", "VARCHAR(36)", false), column("author", "VARCHAR(36)", true)],
        );
        posts.foreign_keys = vec![ForeignKeySnapshot {
            constraint_name: "fk_posts_author".to_string(),
            column: "author".to_string(),
            referenced_table: "users".to_string(),
            referenced_column: "id".to_string(),
            on_delete: ForeignKeyAction::SetNull,
        }];
        posts.indexes = vec![IndexSnapshot {
            name: "idx_posts_author".to_string(),
            columns: vec!["author".to_string()],
            unique: false,
        }];
        let desired = snapshot(vec![posts]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert_eq!(result.operations.len(), 3);
        assert!(matches!(
            result.operations[0],
            MigrationOperation::CreateTable { .. }
        ));
        assert!(matches!(
            result.operations[1],
            MigrationOperation::AddForeignKey { .. }
        ));
        assert!(matches!(
            result.operations[2],
            MigrationOperation::CreateIndex { .. }
        ));
        assert_eq!(result.summary[0], "Create table \"posts\"");
    }

    #[test]
    fn test_drop_table() {
        let actual = snapshot(vec![table("stale", vec![column("id", "TEXT", false)])]);
        let desired = snapshot(vec![]);
        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert_eq!(
            result.operations,
            vec![MigrationOperation::DropTable {
                table: "stale".to_string()
            }]
        );
    }

    #[test]
    fn test_rename_detection_on() {
        let actual = snapshot(vec![table(
            "posts",
            vec![column("id", "VARCHAR(36)", false), column("name", "TEXT", true)],
        )]);
        let desired = snapshot(vec![table(
            "posts",
            vec![column("id", "VARCHAR(36)", false), column("full_name", "TEXT", true)],
        )]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert_eq!(
            result.operations,
            vec![MigrationOperation::RenameColumn {
                table: "posts".to_string(),
                from: "name".to_string(),
                to: "full_name".to_string(),
            }]
        );
    }

    #[test]
    fn test_rename_detection_off() {
        let actual = snapshot(vec![table(
            "posts",
            vec![column("id", "VARCHAR(36)", false), column("name", "TEXT", true)],
        )]);
        let desired = snapshot(vec![table(
            "posts",
            vec![column("id", "VARCHAR(36)", false), column("full_name", "TEXT", true)],
        )]);

        let result = diff_snapshots(
            &actual,
            &desired,
            &DiffOptions {
                detect_renames: false,
            },
        );
        assert_eq!(
            result.operations,
            vec![
                MigrationOperation::AddColumn {
                    table: "posts".to_string(),
                    column: "full_name".to_string(),
                    column_type: "TEXT".to_string(),
                    nullable: true,
                    default_value: None,
                },
                MigrationOperation::DropColumn {
                    table: "posts".to_string(),
                    column: "name".to_string(),
                    previous_type: "TEXT".to_string(),
                    previous_nullable: true,
                },
            ]
        );
    }

    #[test]
    fn test_rename_consumes_each_column_once() {
        let actual = snapshot(vec![table(
            "posts",
            vec![column("a", "TEXT", true), column("b", "TEXT", true)],
        )]);
        let desired = snapshot(vec![table(
            "posts",
            vec![column("x", "TEXT", true), column("y", "TEXT", true), column("z", "TEXT", true)],
        )]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        let renames = result
            .operations
            .iter()
            .filter(|op| matches!(op, MigrationOperation::RenameColumn { .. }))
            .count();
        let adds = result
            .operations
            .iter()
            .filter(|op| matches!(op, MigrationOperation::AddColumn { .. }))
            .count();
        assert_eq!(renames, 2);
        assert_eq!(adds, 1);

        // Every source column consumed by at most one rename
        let mut sources: Vec<&str> = result
            .operations
            .iter()
            .filter_map(|op| match op {
                MigrationOperation::RenameColumn { from, .. } => Some(from.as_str()),
                _ => None,
            })
            .collect();
        sources.sort_unstable();
        sources.dedup();
        assert_eq!(sources.len(), renames);
    }

    #[test]
    fn test_rename_requires_compatible_type() {
        let actual = snapshot(vec![table("posts", vec![column("count", "NUMERIC", true)])]);
        let desired = snapshot(vec![table("posts", vec![column("label", "TEXT", true)])]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert!(result
            .operations
            .iter()
            .all(|op| !matches!(op, MigrationOperation::RenameColumn { .. })));
        assert_eq!(result.operations.len(), 2);
    }

    #[test]
    fn test_type_and_nullability_changes() {
        let actual = snapshot(vec![table(
            "posts",
            vec![column("views", "NUMERIC", true), column("title", "TEXT", true)],
        )]);
        let desired = snapshot(vec![table(
            "posts",
            vec![column("views", "BIGINT", true), column("title", "TEXT", false)],
        )]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert_eq!(
            result.operations,
            vec![
                MigrationOperation::AlterColumnType {
                    table: "posts".to_string(),
                    column: "views".to_string(),
                    from_type: "NUMERIC".to_string(),
                    to_type: "BIGINT".to_string(),
                },
                MigrationOperation::AlterColumnNullable {
                    table: "posts".to_string(),
                    column: "title".to_string(),
                    nullable: false,
                },
            ]
        );
    }

    #[test]
    fn test_normalized_type_spellings_do_not_diff() {
        let actual = snapshot(vec![table(
            "posts",
            vec![column("email", "character varying(255)", true)],
        )]);
        let desired = snapshot(vec![table(
            "posts",
            vec![column("email", "VARCHAR(255)", true)],
        )]);
        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert!(!result.has_changes);
    }

    #[test]
    fn test_default_value_normalization() {
        let mut with_cast = column("_status", "VARCHAR(20)", false);
        with_cast.default_value = Some("'draft'::character varying".to_string());
        let actual = snapshot(vec![table("posts", vec![with_cast])]);

        let mut plain = column("_status", "VARCHAR(20)", false);
        plain.default_value = Some("'draft'".to_string());
        let desired = snapshot(vec![table("posts", vec![plain])]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert!(!result.has_changes, "cast suffix must not produce a diff");
    }

    #[test]
    fn test_default_empty_collapses_to_none() {
        assert_eq!(normalize_default(None), None);
        assert_eq!(normalize_default(Some("")), None);
        assert_eq!(normalize_default(Some("  ")), None);
        assert_eq!(normalize_default(Some("'draft'")), Some("'draft'".to_string()));
    }

    #[test]
    fn test_changed_default_emits_alter() {
        let mut old = column("_status", "VARCHAR(20)", false);
        old.default_value = Some("'draft'".to_string());
        let actual = snapshot(vec![table("posts", vec![old])]);

        let mut new = column("_status", "VARCHAR(20)", false);
        new.default_value = Some("'published'".to_string());
        let desired = snapshot(vec![table("posts", vec![new])]);

        let result = diff_snapshots(&actual, &desired, &DiffOptions::default());
        assert_eq!(
            result.operations,
            vec![MigrationOperation::AlterColumnDefault {
                table: "posts".to_string(),
                column: "_status".to_string(),
                default_value: Some("'published'".to_string()),
                previous_default: Some("'draft'".to_string()),
            }]
        );
    }

    #[test]
    fn test_changed_fk_is_replaced() {
        let mut old_table = table("posts", vec![column("author", "VARCHAR(36)", true)]);
        old_table.foreign_keys = vec![ForeignKeySnapshot {
            constraint_name: "fk_posts_author".to_string(),
            column: "author".to_string(),
            referenced_table: "users".to_string(),
            referenced_column: "id".to_string(),
            on_delete: ForeignKeyAction::SetNull,
        }];
        let mut new_table = old_table.clone();
        new_table.foreign_keys[0].on_delete = ForeignKeyAction::Cascade;

        let result = diff_snapshots(
            &snapshot(vec![old_table]),
            &snapshot(vec![new_table]),
            &DiffOptions::default(),
        );
        assert_eq!(result.operations.len(), 2);
        assert!(matches!(
            result.operations[0],
            MigrationOperation::DropForeignKey { .. }
        ));
        assert!(matches!(
            result.operations[1],
            MigrationOperation::AddForeignKey { .. }
        ));
    }

    #[test]
    fn test_index_column_order_is_significant() {
        let mut old_table = table("posts", vec![]);
        old_table.indexes = vec![IndexSnapshot {
            name: "idx_posts_slug_locale".to_string(),
            columns: vec!["slug".to_string(), "locale".to_string()],
            unique: false,
        }];
        let mut new_table = table("posts", vec![]);
        new_table.indexes = vec![IndexSnapshot {
            name: "idx_posts_slug_locale".to_string(),
            columns: vec!["locale".to_string(), "slug".to_string()],
            unique: false,
        }];

        let result = diff_snapshots(
            &snapshot(vec![old_table]),
            &snapshot(vec![new_table]),
            &DiffOptions::default(),
        );
        assert_eq!(result.operations.len(), 2);
        assert!(matches!(
            result.operations[0],
            MigrationOperation::DropIndex { .. }
        ));
        assert!(matches!(
            result.operations[1],
            MigrationOperation::CreateIndex { .. }
        ));
    }
}
