//! Migration operation variants
//!
//! Every schema change the engine can express is one of these tagged
//! variants. Three subsystems consume them with exhaustive matches: the diff
//! engine produces them, the SQL generator emits forward/reverse SQL, and
//! the danger detector classifies them.

use crate::snapshot::ForeignKeyAction;
use serde::{Deserialize, Serialize};

/// Column definition used inside `createTable`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

/// One schema change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MigrationOperation {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        table: String,
    },
    /// Only generated via explicit hints, never inferred
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        table: String,
        column: String,
        column_type: String,
        nullable: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    DropColumn {
        table: String,
        column: String,
        /// Carried so the reverse SQL can regenerate the column
        previous_type: String,
        previous_nullable: bool,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AlterColumnType {
        table: String,
        column: String,
        from_type: String,
        to_type: String,
    },
    AlterColumnNullable {
        table: String,
        column: String,
        nullable: bool,
    },
    AlterColumnDefault {
        table: String,
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_default: Option<String>,
    },
    AddForeignKey {
        table: String,
        constraint_name: String,
        column: String,
        referenced_table: String,
        referenced_column: String,
        on_delete: ForeignKeyAction,
    },
    DropForeignKey {
        table: String,
        constraint_name: String,
    },
    CreateIndex {
        table: String,
        index_name: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        table: String,
        index_name: String,
    },
    RawSql {
        up_sql: String,
        down_sql: String,
        description: String,
    },
}

impl MigrationOperation {
    /// Human-readable one-line description, used for diff summaries
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("Create table \"{}\"", table),
            Self::DropTable { table } => format!("Drop table \"{}\"", table),
            Self::RenameTable { from, to } => {
                format!("Rename table \"{}\" to \"{}\"", from, to)
            }
            Self::AddColumn { table, column, .. } => {
                format!("Add column \"{}\".\"{}\"", table, column)
            }
            Self::DropColumn { table, column, .. } => {
                format!("Drop column \"{}\".\"{}\"", table, column)
            }
            Self::RenameColumn { table, from, to } => {
                format!("Rename column \"{}\".\"{}\" to \"{}\"", table, from, to)
            }
            Self::AlterColumnType {
                table,
                column,
                from_type,
                to_type,
            } => format!(
                "Change type of \"{}\".\"{}\" from {} to {}",
                table, column, from_type, to_type
            ),
            Self::AlterColumnNullable {
                table,
                column,
                nullable,
            } => {
                if *nullable {
                    format!("Drop NOT NULL on \"{}\".\"{}\"", table, column)
                } else {
                    format!("Set NOT NULL on \"{}\".\"{}\"", table, column)
                }
            }
            Self::AlterColumnDefault { table, column, .. } => {
                format!("Change default of \"{}\".\"{}\"", table, column)
            }
            Self::AddForeignKey {
                table,
                constraint_name,
                ..
            } => format!("Add foreign key \"{}\" on \"{}\"", constraint_name, table),
            Self::DropForeignKey {
                table,
                constraint_name,
            } => format!("Drop foreign key \"{}\" on \"{}\"", constraint_name, table),
            Self::CreateIndex {
                table, index_name, ..
            } => format!("Create index \"{}\" on \"{}\"", index_name, table),
            Self::DropIndex {
                table, index_name, ..
            } => format!("Drop index \"{}\" on \"{}\"", index_name, table),
            Self::RawSql { description, .. } => format!("Raw SQL: {}", description),
        }
    }

    /// The table this operation touches, if any
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::AlterColumnType { table, .. }
            | Self::AlterColumnNullable { table, .. }
            | Self::AlterColumnDefault { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. } => Some(table),
            Self::RenameTable { to, .. } => Some(to),
            Self::RawSql { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let op = MigrationOperation::AddColumn {
            table: "posts".to_string(),
            column: "title".to_string(),
            column_type: "TEXT".to_string(),
            nullable: false,
            default_value: None,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "addColumn");
        assert_eq!(json["columnType"], "TEXT");

        let roundtrip: MigrationOperation = serde_json::from_value(json).unwrap();
        assert_eq!(roundtrip, op);
    }

    #[test]
    fn test_summary_create_table() {
        let op = MigrationOperation::CreateTable {
            table: "posts".to_string(),
            columns: Vec::new(),
        };
        assert_eq!(op.summary(), "Create table \"posts\"");
    }
}
