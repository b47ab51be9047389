//! PostgreSQL introspection
//!
//! Four catalog queries, issued concurrently, cover columns, foreign keys,
//! indexes, and primary keys. PK-backing indexes and the implicit indexes
//! behind FK constraints are filtered out so snapshots only carry indexes
//! the diff engine manages.

use crate::adapter::{DatabaseAdapter, Row, row_bool, row_i64, row_str, row_string};
use crate::error::Result;
use crate::snapshot::{
    ColumnSnapshot, DatabaseSchemaSnapshot, ForeignKeyAction, ForeignKeySnapshot, IndexSnapshot,
    TableSnapshot, is_internal_table,
};
use momentum_types::{Dialect, normalize_type};
use serde_json::json;
use std::collections::{HashMap, HashSet};

const COLUMNS_QUERY: &str = "\
SELECT table_name, column_name, data_type, character_maximum_length, is_nullable, column_default \
FROM information_schema.columns \
WHERE table_schema = $1 \
ORDER BY table_name, ordinal_position";

const FOREIGN_KEYS_QUERY: &str = "\
SELECT tc.table_name, tc.constraint_name, kcu.column_name, \
ccu.table_name AS referenced_table, ccu.column_name AS referenced_column, rc.delete_rule \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
JOIN information_schema.constraint_column_usage ccu \
  ON tc.constraint_name = ccu.constraint_name AND tc.table_schema = ccu.table_schema \
JOIN information_schema.referential_constraints rc \
  ON tc.constraint_name = rc.constraint_name AND tc.table_schema = rc.constraint_schema \
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = $1";

const INDEXES_QUERY: &str =
    "SELECT tablename, indexname, indexdef FROM pg_indexes WHERE schemaname = $1";

const PRIMARY_KEYS_QUERY: &str = "\
SELECT tc.table_name, kcu.column_name \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = $1";

/// Introspect one PostgreSQL schema into a snapshot
pub async fn introspect(db: &dyn DatabaseAdapter, schema: &str) -> Result<DatabaseSchemaSnapshot> {
    let params = [json!(schema)];
    let (column_rows, fk_rows, index_rows, pk_rows) = tokio::try_join!(
        db.query_raw(COLUMNS_QUERY, &params),
        db.query_raw(FOREIGN_KEYS_QUERY, &params),
        db.query_raw(INDEXES_QUERY, &params),
        db.query_raw(PRIMARY_KEYS_QUERY, &params),
    )?;

    Ok(DatabaseSchemaSnapshot::from_tables(
        Dialect::PostgreSQL,
        assemble(&column_rows, &fk_rows, &index_rows, &pk_rows),
    ))
}

fn assemble(
    column_rows: &[Row],
    fk_rows: &[Row],
    index_rows: &[Row],
    pk_rows: &[Row],
) -> Vec<TableSnapshot> {
    // Primary-key lookup: (table, column)
    let primary_keys: HashSet<(String, String)> = pk_rows
        .iter()
        .filter_map(|row| {
            Some((
                row_str(row, "table_name")?.to_string(),
                row_str(row, "column_name")?.to_string(),
            ))
        })
        .collect();

    // Tables in first-seen order (the columns query sorts by table name)
    let mut order: Vec<String> = Vec::new();
    let mut tables: HashMap<String, TableSnapshot> = HashMap::new();

    for row in column_rows {
        let Some(table_name) = row_str(row, "table_name") else {
            continue;
        };
        if is_internal_table(table_name) {
            continue;
        }
        let Some(column_name) = row_str(row, "column_name") else {
            continue;
        };
        let data_type = row_str(row, "data_type").unwrap_or_default();

        let table = tables.entry(table_name.to_string()).or_insert_with(|| {
            order.push(table_name.to_string());
            TableSnapshot {
                name: table_name.to_string(),
                columns: Vec::new(),
                foreign_keys: Vec::new(),
                indexes: Vec::new(),
            }
        });

        table.columns.push(ColumnSnapshot {
            name: column_name.to_string(),
            column_type: build_type(data_type, row_i64(row, "character_maximum_length")),
            nullable: row_bool(row, "is_nullable").unwrap_or(true),
            default_value: row_string(row, "column_default"),
            is_primary_key: primary_keys
                .contains(&(table_name.to_string(), column_name.to_string())),
        });
    }

    let mut fk_names_by_table: HashMap<String, HashSet<String>> = HashMap::new();
    for row in fk_rows {
        let Some(table_name) = row_str(row, "table_name") else {
            continue;
        };
        let Some(constraint_name) = row_str(row, "constraint_name") else {
            continue;
        };
        fk_names_by_table
            .entry(table_name.to_string())
            .or_default()
            .insert(constraint_name.to_string());

        let Some(table) = tables.get_mut(table_name) else {
            continue;
        };
        // Multi-column FKs repeat in key_column_usage; keep the first row
        if table.foreign_keys.iter().any(|fk| fk.constraint_name == constraint_name) {
            continue;
        }
        table.foreign_keys.push(ForeignKeySnapshot {
            constraint_name: constraint_name.to_string(),
            column: row_str(row, "column_name").unwrap_or_default().to_string(),
            referenced_table: row_str(row, "referenced_table").unwrap_or_default().to_string(),
            referenced_column: row_str(row, "referenced_column").unwrap_or_default().to_string(),
            on_delete: ForeignKeyAction::parse(row_str(row, "delete_rule").unwrap_or("NO ACTION")),
        });
    }

    for row in index_rows {
        let Some(table_name) = row_str(row, "tablename") else {
            continue;
        };
        let Some(index_name) = row_str(row, "indexname") else {
            continue;
        };
        let indexdef = row_str(row, "indexdef").unwrap_or_default();

        // PK-backing indexes and FK-named indexes are not ours to manage
        if indexdef.contains("PRIMARY KEY") || index_name.ends_with("_pkey") {
            continue;
        }
        if fk_names_by_table
            .get(table_name)
            .is_some_and(|names| names.contains(index_name))
        {
            continue;
        }
        let Some(table) = tables.get_mut(table_name) else {
            continue;
        };

        table.indexes.push(IndexSnapshot {
            name: index_name.to_string(),
            columns: parse_index_columns(indexdef),
            unique: indexdef.starts_with("CREATE UNIQUE INDEX"),
        });
    }

    order
        .into_iter()
        .filter_map(|name| tables.remove(&name))
        .collect()
}

/// Combine `data_type` and `character_maximum_length` before normalizing
fn build_type(data_type: &str, max_length: Option<i64>) -> String {
    let raw = match max_length {
        Some(len) => format!("{}({})", data_type, len),
        None => data_type.to_string(),
    };
    normalize_type(&raw, Dialect::PostgreSQL)
}

/// Extract the parenthesized column list from an `indexdef`
fn parse_index_columns(indexdef: &str) -> Vec<String> {
    let Some(start) = indexdef.find('(') else {
        return Vec::new();
    };
    let Some(end) = indexdef[start..].find(')') else {
        return Vec::new();
    };
    indexdef[start + 1..start + end]
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}
