//! SQLite introspection
//!
//! Walks `sqlite_master` for table names, then gathers per-table detail
//! through the PRAGMA family. SQLite has no named FK constraints, so
//! constraint names are synthesized as `fk_{table}_{column}` to match what
//! the desired-schema builder emits.

use crate::adapter::{DatabaseAdapter, row_bool, row_str, row_string};
use crate::error::Result;
use crate::snapshot::{
    ColumnSnapshot, DatabaseSchemaSnapshot, ForeignKeyAction, ForeignKeySnapshot, IndexSnapshot,
    TableSnapshot, is_internal_table,
};
use crate::sqlgen::quote_ident;
use momentum_types::{Dialect, normalize_type};

const TABLES_QUERY: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Introspect a SQLite database into a snapshot
pub async fn introspect(db: &dyn DatabaseAdapter) -> Result<DatabaseSchemaSnapshot> {
    let table_rows = db.query_raw(TABLES_QUERY, &[]).await?;

    let mut tables = Vec::new();
    for row in &table_rows {
        let Some(name) = row_str(row, "name") else {
            continue;
        };
        if is_internal_table(name) {
            continue;
        }
        tables.push(introspect_table(db, name).await?);
    }

    Ok(DatabaseSchemaSnapshot::from_tables(Dialect::SQLite, tables))
}

async fn introspect_table(db: &dyn DatabaseAdapter, table: &str) -> Result<TableSnapshot> {
    let quoted = quote_ident(table);

    let mut columns = Vec::new();
    for row in &db
        .query_raw(&format!("PRAGMA table_info({})", quoted), &[])
        .await?
    {
        let Some(name) = row_str(row, "name") else {
            continue;
        };
        let declared = row_str(row, "type").unwrap_or_default();
        columns.push(ColumnSnapshot {
            name: name.to_string(),
            column_type: normalize_type(declared, Dialect::SQLite),
            nullable: !row_bool(row, "notnull").unwrap_or(false),
            default_value: row_string(row, "dflt_value"),
            is_primary_key: row_bool(row, "pk").unwrap_or(false),
        });
    }

    let mut foreign_keys = Vec::new();
    for row in &db
        .query_raw(&format!("PRAGMA foreign_key_list({})", quoted), &[])
        .await?
    {
        let Some(from) = row_str(row, "from") else {
            continue;
        };
        foreign_keys.push(ForeignKeySnapshot {
            constraint_name: format!("fk_{}_{}", table, from),
            column: from.to_string(),
            referenced_table: row_str(row, "table").unwrap_or_default().to_string(),
            // A NULL "to" column means the FK references the target's PK
            referenced_column: row_str(row, "to").unwrap_or("id").to_string(),
            on_delete: ForeignKeyAction::parse(row_str(row, "on_delete").unwrap_or("NO ACTION")),
        });
    }

    let mut indexes = Vec::new();
    for row in &db
        .query_raw(&format!("PRAGMA index_list({})", quoted), &[])
        .await?
    {
        let Some(index_name) = row_str(row, "name") else {
            continue;
        };
        // PK-backing indexes and the automatic indexes behind inline UNIQUE
        // constraints are not managed by the diff engine.
        if row_str(row, "origin") == Some("pk") || index_name.starts_with("sqlite_autoindex_") {
            continue;
        }
        let unique = row_bool(row, "unique").unwrap_or(false);

        let mut index_columns = Vec::new();
        for info in &db
            .query_raw(&format!("PRAGMA index_info({})", quote_ident(index_name)), &[])
            .await?
        {
            if let Some(column) = row_str(info, "name") {
                index_columns.push(column.to_string());
            }
        }

        indexes.push(IndexSnapshot {
            name: index_name.to_string(),
            columns: index_columns,
            unique,
        });
    }

    Ok(TableSnapshot {
        name: table.to_string(),
        columns,
        foreign_keys,
        indexes,
    })
}
