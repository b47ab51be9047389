//! Schema snapshot model
//!
//! A snapshot is an immutable, dialect-normalized picture of a database
//! schema, built either from collection configs (desired) or live-database
//! introspection (actual). Snapshots carry a SHA-256 checksum over a
//! canonical representation of their tables so two snapshots with the same
//! tables compare equal regardless of the order anything was discovered in.

use crate::error::{MigrateError, Result};
use chrono::Utc;
use momentum_types::Dialect;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Tables excluded from every snapshot and diff
pub const INTERNAL_TABLES: [&str; 3] = ["_momentum_migrations", "_momentum_seeds", "_globals"];

/// Whether a table belongs to the engine rather than user data
#[must_use]
pub fn is_internal_table(name: &str) -> bool {
    INTERNAL_TABLES.contains(&name)
}

/// One column as captured in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSnapshot {
    pub name: String,
    /// Raw dialect type string; compare through `normalize_type`
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
}

/// Referential action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    #[serde(rename = "CASCADE")]
    Cascade,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "NO ACTION")]
    NoAction,
}

impl ForeignKeyAction {
    /// SQL spelling of the action
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
        }
    }

    /// Parse a catalog-returned action string
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "RESTRICT" => Self::Restrict,
            _ => Self::NoAction,
        }
    }
}

/// One foreign key as captured in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeySnapshot {
    pub constraint_name: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: ForeignKeyAction,
}

/// One index as captured in a snapshot
///
/// PK-backing and FK-auto indexes are filtered out by the introspectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub name: String,
    /// Column order is significant
    pub columns: Vec<String>,
    pub unique: bool,
}

/// One table as captured in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnSnapshot>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySnapshot>,
    #[serde(default)]
    pub indexes: Vec<IndexSnapshot>,
}

/// A full database schema snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchemaSnapshot {
    pub dialect: Dialect,
    pub tables: Vec<TableSnapshot>,
    /// ISO-8601 capture time; never part of the checksum
    pub captured_at: String,
    pub checksum: String,
}

impl DatabaseSchemaSnapshot {
    /// Build a snapshot from tables, computing the checksum
    ///
    /// Table/column order is preserved as given (introspectors keep catalog
    /// ordinal order, which the rename heuristic relies on); the checksum is
    /// computed over a sorted canonical form so input order never matters.
    #[must_use]
    pub fn from_tables(dialect: Dialect, tables: Vec<TableSnapshot>) -> Self {
        let checksum = compute_checksum(&tables);
        Self {
            dialect,
            tables,
            captured_at: Utc::now().to_rfc3339(),
            checksum,
        }
    }

    /// Serialize to the human-readable snapshot file format (tab-indented JSON)
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8(buf).expect("serde_json emits UTF-8"))
    }

    /// Parse and validate a snapshot from JSON
    ///
    /// Fails with [`MigrateError::InvalidSnapshot`] when required fields are
    /// missing or the dialect is unknown.
    pub fn parse(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| MigrateError::InvalidSnapshot(e.to_string()))?;
        for table in &snapshot.tables {
            if table.name.is_empty() {
                return Err(MigrateError::InvalidSnapshot(
                    "table with empty name".to_string(),
                ));
            }
        }
        Ok(snapshot)
    }

    /// Recompute the checksum from the current tables
    #[must_use]
    pub fn computed_checksum(&self) -> String {
        compute_checksum(&self.tables)
    }

    /// Look up a table by name
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// SHA-256 over the canonical JSON form of the tables
///
/// Canonical form: tables sorted by name; within each table, columns,
/// foreign keys, and indexes sorted by their name.
fn compute_checksum(tables: &[TableSnapshot]) -> String {
    let mut canonical: Vec<TableSnapshot> = tables.to_vec();
    canonical.sort_by(|a, b| a.name.cmp(&b.name));
    for table in &mut canonical {
        table.columns.sort_by(|a, b| a.name.cmp(&b.name));
        table
            .foreign_keys
            .sort_by(|a, b| a.constraint_name.cmp(&b.constraint_name));
        table.indexes.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let json = serde_json::to_vec(&canonical).expect("snapshot tables serialize");
    let digest = Sha256::digest(&json);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 hex digest of arbitrary input, shared by the tracker checksum
#[must_use]
pub fn sha256_hex(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
