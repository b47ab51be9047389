//! SQL generation for migration operations
//!
//! Every operation maps to one forward and one reverse statement per
//! dialect. Identifiers are always double-quoted. Alterations SQLite cannot
//! express (column type/nullability/default changes, adding constraints to
//! an existing table) emit a `--` comment statement instead; the danger
//! detector flags those as errors before execution normally reaches here.

use crate::operation::{ColumnDef, MigrationOperation};
use momentum_types::Dialect;

/// Quote an identifier for SQL, escaping embedded quotes
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_idents(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Forward SQL for one operation
#[must_use]
pub fn operation_to_up_sql(op: &MigrationOperation, dialect: Dialect) -> String {
    match op {
        MigrationOperation::CreateTable { table, columns } => create_table_sql(table, columns),
        MigrationOperation::DropTable { table } => {
            format!("DROP TABLE {};", quote_ident(table))
        }
        MigrationOperation::RenameTable { from, to } => {
            format!(
                "ALTER TABLE {} RENAME TO {};",
                quote_ident(from),
                quote_ident(to)
            )
        }
        MigrationOperation::AddColumn {
            table,
            column,
            column_type,
            nullable,
            default_value,
        } => add_column_sql(table, column, column_type, *nullable, default_value.as_deref()),
        MigrationOperation::DropColumn { table, column, .. } => {
            format!(
                "ALTER TABLE {} DROP COLUMN {};",
                quote_ident(table),
                quote_ident(column)
            )
        }
        MigrationOperation::RenameColumn { table, from, to } => {
            format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                quote_ident(table),
                quote_ident(from),
                quote_ident(to)
            )
        }
        MigrationOperation::AlterColumnType {
            table,
            column,
            from_type,
            to_type,
        } => {
            if dialect.supports_column_alteration() {
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                    quote_ident(table),
                    quote_ident(column),
                    to_type
                )
            } else {
                format!(
                    "-- {} cannot change column types in place ({}.{} {} -> {})",
                    dialect, table, column, from_type, to_type
                )
            }
        }
        MigrationOperation::AlterColumnNullable {
            table,
            column,
            nullable,
        } => alter_nullable_sql(table, column, *nullable, dialect),
        MigrationOperation::AlterColumnDefault {
            table,
            column,
            default_value,
            ..
        } => alter_default_sql(table, column, default_value.as_deref(), dialect),
        MigrationOperation::AddForeignKey {
            table,
            constraint_name,
            column,
            referenced_table,
            referenced_column,
            on_delete,
        } => match dialect {
            Dialect::PostgreSQL => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {};",
                quote_ident(table),
                quote_ident(constraint_name),
                quote_ident(column),
                quote_ident(referenced_table),
                quote_ident(referenced_column),
                on_delete.as_sql()
            ),
            Dialect::SQLite => format!(
                "-- sqlite cannot add constraint {} to existing table {}",
                constraint_name, table
            ),
        },
        MigrationOperation::DropForeignKey {
            table,
            constraint_name,
        } => match dialect {
            Dialect::PostgreSQL => format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                quote_ident(table),
                quote_ident(constraint_name)
            ),
            Dialect::SQLite => format!(
                "-- sqlite cannot drop constraint {} from table {}",
                constraint_name, table
            ),
        },
        MigrationOperation::CreateIndex {
            table,
            index_name,
            columns,
            unique,
        } => {
            let unique_kw = if *unique { "UNIQUE " } else { "" };
            format!(
                "CREATE {}INDEX {} ON {} ({});",
                unique_kw,
                quote_ident(index_name),
                quote_ident(table),
                quote_idents(columns)
            )
        }
        MigrationOperation::DropIndex { index_name, .. } => {
            format!("DROP INDEX {};", quote_ident(index_name))
        }
        MigrationOperation::RawSql { up_sql, .. } => up_sql.clone(),
    }
}

/// Reverse SQL for one operation
#[must_use]
pub fn operation_to_down_sql(op: &MigrationOperation, dialect: Dialect) -> String {
    match op {
        MigrationOperation::CreateTable { table, .. } => {
            format!("DROP TABLE {};", quote_ident(table))
        }
        MigrationOperation::DropTable { table } => {
            format!("-- cannot recreate dropped table {}", table)
        }
        MigrationOperation::RenameTable { from, to } => {
            format!(
                "ALTER TABLE {} RENAME TO {};",
                quote_ident(to),
                quote_ident(from)
            )
        }
        MigrationOperation::AddColumn { table, column, .. } => {
            format!(
                "ALTER TABLE {} DROP COLUMN {};",
                quote_ident(table),
                quote_ident(column)
            )
        }
        MigrationOperation::DropColumn {
            table,
            column,
            previous_type,
            previous_nullable,
        } => add_column_sql(table, column, previous_type, *previous_nullable, None),
        MigrationOperation::RenameColumn { table, from, to } => {
            format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                quote_ident(table),
                quote_ident(to),
                quote_ident(from)
            )
        }
        MigrationOperation::AlterColumnType {
            table,
            column,
            from_type,
            to_type,
        } => {
            if dialect.supports_column_alteration() {
                format!(
                    "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                    quote_ident(table),
                    quote_ident(column),
                    from_type
                )
            } else {
                format!(
                    "-- {} cannot change column types in place ({}.{} {} -> {})",
                    dialect, table, column, to_type, from_type
                )
            }
        }
        MigrationOperation::AlterColumnNullable {
            table,
            column,
            nullable,
        } => alter_nullable_sql(table, column, !*nullable, dialect),
        MigrationOperation::AlterColumnDefault {
            table,
            column,
            previous_default,
            ..
        } => alter_default_sql(table, column, previous_default.as_deref(), dialect),
        MigrationOperation::AddForeignKey {
            table,
            constraint_name,
            ..
        } => match dialect {
            Dialect::PostgreSQL => format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                quote_ident(table),
                quote_ident(constraint_name)
            ),
            Dialect::SQLite => format!(
                "-- sqlite cannot drop constraint {} from table {}",
                constraint_name, table
            ),
        },
        MigrationOperation::DropForeignKey {
            table,
            constraint_name,
        } => format!(
            "-- cannot recreate dropped constraint {} on {}",
            constraint_name, table
        ),
        MigrationOperation::CreateIndex { index_name, .. } => {
            format!("DROP INDEX {};", quote_ident(index_name))
        }
        MigrationOperation::DropIndex {
            table, index_name, ..
        } => format!("-- cannot recreate dropped index {} on {}", index_name, table),
        MigrationOperation::RawSql { down_sql, .. } => down_sql.clone(),
    }
}

/// Forward SQL for a full operation list, in order
#[must_use]
pub fn operations_to_up_sql(ops: &[MigrationOperation], dialect: Dialect) -> Vec<String> {
    ops.iter().map(|op| operation_to_up_sql(op, dialect)).collect()
}

/// Reverse SQL for a full operation list, in reverse order
#[must_use]
pub fn operations_to_down_sql(ops: &[MigrationOperation], dialect: Dialect) -> Vec<String> {
    ops.iter()
        .rev()
        .map(|op| operation_to_down_sql(op, dialect))
        .collect()
}

/// Whether a generated statement is a comment placeholder rather than SQL
#[must_use]
pub fn is_comment_statement(sql: &str) -> bool {
    sql.trim_start().starts_with("--")
}

fn create_table_sql(table: &str, columns: &[ColumnDef]) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", quote_ident(table));
    for (i, column) in columns.iter().enumerate() {
        sql.push('\t');
        sql.push_str(&column_definition(column));
        if i < columns.len() - 1 {
            sql.push(',');
        }
        sql.push('\n');
    }
    sql.push_str(");");
    sql
}

fn column_definition(column: &ColumnDef) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), column.column_type);
    if column.primary_key {
        def.push_str(" PRIMARY KEY");
    }
    if let Some(default) = &column.default_value {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    def
}

fn add_column_sql(
    table: &str,
    column: &str,
    column_type: &str,
    nullable: bool,
    default_value: Option<&str>,
) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(column),
        column_type
    );
    if let Some(default) = default_value {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    if !nullable {
        sql.push_str(" NOT NULL");
    }
    sql.push(';');
    sql
}

fn alter_nullable_sql(table: &str, column: &str, nullable: bool, dialect: Dialect) -> String {
    if !dialect.supports_column_alteration() {
        return format!(
            "-- {} cannot change column nullability in place ({}.{})",
            dialect, table, column
        );
    }
    let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
    format!(
        "ALTER TABLE {} ALTER COLUMN {} {};",
        quote_ident(table),
        quote_ident(column),
        action
    )
}

fn alter_default_sql(
    table: &str,
    column: &str,
    default_value: Option<&str>,
    dialect: Dialect,
) -> String {
    if !dialect.supports_column_alteration() {
        return format!(
            "-- {} cannot change column defaults in place ({}.{})",
            dialect, table, column
        );
    }
    match default_value {
        Some(default) => format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
            quote_ident(table),
            quote_ident(column),
            default
        ),
        None => format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
            quote_ident(table),
            quote_ident(column)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ForeignKeyAction;

    #[test]
    fn test_create_table_sql() {
        let op = MigrationOperation::CreateTable {
            table: "posts".to_string(),
            columns: vec![
                ColumnDef {
                    name: "id".to_string(),
                    column_type: "VARCHAR(36)".to_string(),
                    nullable: false,
                    default_value: None,
                    primary_key: true,
                },
                ColumnDef {
                    name: "_status".to_string(),
                    column_type: "VARCHAR(20)".to_string(),
                    nullable: false,
                    default_value: Some("'draft'".to_string()),
                    primary_key: false,
                },
                ColumnDef {
                    name: "body".to_string(),
                    column_type: "TEXT".to_string(),
                    nullable: true,
                    default_value: None,
                    primary_key: false,
                },
            ],
        };
        let sql = operation_to_up_sql(&op, Dialect::PostgreSQL);
        assert_eq!(
            sql,
            "CREATE TABLE \"posts\" (\n\t\"id\" VARCHAR(36) PRIMARY KEY NOT NULL,\n\t\"_status\" VARCHAR(20) DEFAULT 'draft' NOT NULL,\n\t\"body\" TEXT\n);"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::PostgreSQL),
            "DROP TABLE \"posts\";"
        );
    }

    #[test]
    fn test_add_column_roundtrip() {
        let op = MigrationOperation::AddColumn {
            table: "posts".to_string(),
            column: "rank".to_string(),
            column_type: "NUMERIC".to_string(),
            nullable: false,
            default_value: Some("0".to_string()),
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ADD COLUMN \"rank\" NUMERIC DEFAULT 0 NOT NULL;"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" DROP COLUMN \"rank\";"
        );
    }

    #[test]
    fn test_drop_column_reverse_regenerates() {
        let op = MigrationOperation::DropColumn {
            table: "posts".to_string(),
            column: "legacy".to_string(),
            previous_type: "TEXT".to_string(),
            previous_nullable: false,
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::SQLite),
            "ALTER TABLE \"posts\" DROP COLUMN \"legacy\";"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::SQLite),
            "ALTER TABLE \"posts\" ADD COLUMN \"legacy\" TEXT NOT NULL;"
        );
    }

    #[test]
    fn test_alter_type_sqlite_is_comment() {
        let op = MigrationOperation::AlterColumnType {
            table: "posts".to_string(),
            column: "views".to_string(),
            from_type: "TEXT".to_string(),
            to_type: "INTEGER".to_string(),
        };
        let sql = operation_to_up_sql(&op, Dialect::SQLite);
        assert!(is_comment_statement(&sql));

        let pg = operation_to_up_sql(&op, Dialect::PostgreSQL);
        assert_eq!(pg, "ALTER TABLE \"posts\" ALTER COLUMN \"views\" TYPE INTEGER;");
        assert_eq!(
            operation_to_down_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ALTER COLUMN \"views\" TYPE TEXT;"
        );
    }

    #[test]
    fn test_alter_nullable() {
        let op = MigrationOperation::AlterColumnNullable {
            table: "posts".to_string(),
            column: "title".to_string(),
            nullable: false,
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ALTER COLUMN \"title\" SET NOT NULL;"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ALTER COLUMN \"title\" DROP NOT NULL;"
        );
        assert!(is_comment_statement(&operation_to_up_sql(&op, Dialect::SQLite)));
    }

    #[test]
    fn test_alter_default() {
        let op = MigrationOperation::AlterColumnDefault {
            table: "posts".to_string(),
            column: "_status".to_string(),
            default_value: Some("'published'".to_string()),
            previous_default: None,
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ALTER COLUMN \"_status\" SET DEFAULT 'published';"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ALTER COLUMN \"_status\" DROP DEFAULT;"
        );
    }

    #[test]
    fn test_foreign_key_sql() {
        let op = MigrationOperation::AddForeignKey {
            table: "posts".to_string(),
            constraint_name: "fk_posts_author".to_string(),
            column: "author".to_string(),
            referenced_table: "users".to_string(),
            referenced_column: "id".to_string(),
            on_delete: ForeignKeyAction::SetNull,
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" ADD CONSTRAINT \"fk_posts_author\" FOREIGN KEY (\"author\") REFERENCES \"users\"(\"id\") ON DELETE SET NULL;"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::PostgreSQL),
            "ALTER TABLE \"posts\" DROP CONSTRAINT \"fk_posts_author\";"
        );
        assert!(is_comment_statement(&operation_to_up_sql(&op, Dialect::SQLite)));
    }

    #[test]
    fn test_create_index_sql() {
        let op = MigrationOperation::CreateIndex {
            table: "posts".to_string(),
            index_name: "idx_posts_slug_locale".to_string(),
            columns: vec!["slug".to_string(), "locale".to_string()],
            unique: true,
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::SQLite),
            "CREATE UNIQUE INDEX \"idx_posts_slug_locale\" ON \"posts\" (\"slug\", \"locale\");"
        );
        assert_eq!(
            operation_to_down_sql(&op, Dialect::SQLite),
            "DROP INDEX \"idx_posts_slug_locale\";"
        );
    }

    #[test]
    fn test_raw_sql_passthrough() {
        let op = MigrationOperation::RawSql {
            up_sql: "UPDATE \"posts\" SET \"views\" = 0;".to_string(),
            down_sql: "-- no reverse".to_string(),
            description: "reset view counts".to_string(),
        };
        assert_eq!(
            operation_to_up_sql(&op, Dialect::SQLite),
            "UPDATE \"posts\" SET \"views\" = 0;"
        );
        assert_eq!(operation_to_down_sql(&op, Dialect::SQLite), "-- no reverse");
    }

    #[test]
    fn test_down_sql_reverses_order() {
        let ops = vec![
            MigrationOperation::CreateTable {
                table: "a".to_string(),
                columns: vec![],
            },
            MigrationOperation::CreateTable {
                table: "b".to_string(),
                columns: vec![],
            },
        ];
        let down = operations_to_down_sql(&ops, Dialect::SQLite);
        assert_eq!(down[0], "DROP TABLE \"b\";");
        assert_eq!(down[1], "DROP TABLE \"a\";");
    }
}
