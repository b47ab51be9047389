//! Desired-schema builder
//!
//! Turns a list of declarative collection configs into a
//! [`DatabaseSchemaSnapshot`]. Relationship targets are resolved through a
//! slug-to-table map built in a first pass, so mutually-referencing
//! collections work without any cyclic ownership: FK snapshots carry names,
//! not pointers.

use crate::snapshot::{
    ColumnSnapshot, DatabaseSchemaSnapshot, ForeignKeyAction, ForeignKeySnapshot, IndexSnapshot,
    TableSnapshot,
};
use momentum_types::{
    Collection, Dialect, FieldKind, FlattenedField, OnDeleteRule, flatten_fields,
    sql_type_for_field,
};
use std::collections::HashMap;

/// Build the desired snapshot for a set of collections
#[must_use]
pub fn snapshot_from_collections(
    collections: &[Collection],
    dialect: Dialect,
) -> DatabaseSchemaSnapshot {
    // First pass: slug -> table name, for FK target resolution
    let table_by_slug: HashMap<&str, &str> = collections
        .iter()
        .map(|c| (c.slug.as_str(), c.table_name()))
        .collect();

    let mut tables = Vec::new();
    for collection in collections {
        tables.push(build_table(collection, dialect, &table_by_slug));
        if collection.versions.is_some() {
            tables.push(build_versions_table(collection, dialect));
        }
    }

    DatabaseSchemaSnapshot::from_tables(dialect, tables)
}

fn build_table(
    collection: &Collection,
    dialect: Dialect,
    table_by_slug: &HashMap<&str, &str>,
) -> TableSnapshot {
    let table = collection.table_name();
    let mut columns = vec![id_column(dialect)];

    if collection.timestamps {
        columns.push(timestamp_column(dialect, "createdAt", false));
        columns.push(timestamp_column(dialect, "updatedAt", false));
    }

    if collection.versions.is_some_and(|v| v.drafts) {
        columns.push(status_column(dialect));
    }

    if let Some(soft_delete) = &collection.soft_delete {
        columns.push(timestamp_column(dialect, &soft_delete.field, true));
    }

    let flattened = flatten_fields(&collection.fields);
    let mut foreign_keys = Vec::new();
    for field in &flattened {
        columns.push(data_column(field, dialect));
        if let Some(fk) = foreign_key_for(field, table, table_by_slug) {
            foreign_keys.push(fk);
        }
    }

    let mut indexes = Vec::new();
    if let Some(soft_delete) = &collection.soft_delete {
        indexes.push(IndexSnapshot {
            name: format!("idx_{}_{}", table, soft_delete.field),
            columns: vec![soft_delete.field.clone()],
            unique: false,
        });
    }
    for index in &collection.indexes {
        let name = index
            .name
            .clone()
            .unwrap_or_else(|| format!("idx_{}_{}", table, index.columns.join("_")));
        indexes.push(IndexSnapshot {
            name,
            columns: index.columns.clone(),
            unique: index.unique,
        });
    }

    TableSnapshot {
        name: table.to_string(),
        columns,
        foreign_keys,
        indexes,
    }
}

/// The `{table}_versions` side table: version metadata only, never the
/// flattened data columns of the base table.
fn build_versions_table(collection: &Collection, dialect: Dialect) -> TableSnapshot {
    let table = collection.versions_table_name();
    let id_type = match dialect {
        Dialect::PostgreSQL => "VARCHAR(36)",
        Dialect::SQLite => "TEXT",
    };

    let columns = vec![
        id_column(dialect),
        ColumnSnapshot {
            name: "parent".to_string(),
            column_type: id_type.to_string(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
        },
        ColumnSnapshot {
            name: "version".to_string(),
            column_type: "TEXT".to_string(),
            nullable: false,
            default_value: None,
            is_primary_key: false,
        },
        status_column(dialect),
        ColumnSnapshot {
            name: "autosave".to_string(),
            column_type: match dialect {
                Dialect::PostgreSQL => "BOOLEAN".to_string(),
                Dialect::SQLite => "INTEGER".to_string(),
            },
            nullable: false,
            default_value: Some(match dialect {
                Dialect::PostgreSQL => "false".to_string(),
                Dialect::SQLite => "0".to_string(),
            }),
            is_primary_key: false,
        },
        timestamp_column(dialect, "publishedAt", true),
        timestamp_column(dialect, "createdAt", false),
        timestamp_column(dialect, "updatedAt", false),
    ];

    let foreign_keys = vec![ForeignKeySnapshot {
        constraint_name: format!("fk_{}_parent", table),
        column: "parent".to_string(),
        referenced_table: collection.table_name().to_string(),
        referenced_column: "id".to_string(),
        on_delete: ForeignKeyAction::Cascade,
    }];

    let indexes = ["parent", "_status", "createdAt"]
        .iter()
        .map(|col| IndexSnapshot {
            name: format!("idx_{}_{}", table, col),
            columns: vec![(*col).to_string()],
            unique: false,
        })
        .collect();

    TableSnapshot {
        name: table,
        columns,
        foreign_keys,
        indexes,
    }
}

fn id_column(dialect: Dialect) -> ColumnSnapshot {
    ColumnSnapshot {
        name: "id".to_string(),
        column_type: match dialect {
            Dialect::PostgreSQL => "VARCHAR(36)".to_string(),
            Dialect::SQLite => "TEXT".to_string(),
        },
        nullable: false,
        default_value: None,
        is_primary_key: true,
    }
}

fn timestamp_column(dialect: Dialect, name: &str, nullable: bool) -> ColumnSnapshot {
    ColumnSnapshot {
        name: name.to_string(),
        column_type: match dialect {
            Dialect::PostgreSQL => "TIMESTAMPTZ".to_string(),
            Dialect::SQLite => "TEXT".to_string(),
        },
        nullable,
        default_value: None,
        is_primary_key: false,
    }
}

fn status_column(dialect: Dialect) -> ColumnSnapshot {
    ColumnSnapshot {
        name: "_status".to_string(),
        column_type: match dialect {
            Dialect::PostgreSQL => "VARCHAR(20)".to_string(),
            Dialect::SQLite => "TEXT".to_string(),
        },
        nullable: false,
        default_value: Some("'draft'".to_string()),
        is_primary_key: false,
    }
}

fn data_column(field: &FlattenedField, dialect: Dialect) -> ColumnSnapshot {
    ColumnSnapshot {
        name: field.name.clone(),
        column_type: sql_type_for_field(field.kind, dialect).to_string(),
        nullable: !field.required,
        default_value: None,
        is_primary_key: false,
    }
}

/// FK emission for a flattened relationship/upload field
///
/// Skipped for `hasMany` (no column-level FK possible), polymorphic targets
/// (no single referenced table exists), and unknown slugs.
fn foreign_key_for(
    field: &FlattenedField,
    table: &str,
    table_by_slug: &HashMap<&str, &str>,
) -> Option<ForeignKeySnapshot> {
    if !matches!(field.kind, FieldKind::Relationship | FieldKind::Upload) {
        return None;
    }
    let relationship = field.relationship.as_ref()?;
    if relationship.has_many {
        return None;
    }
    let target_slug = relationship.single_target()?;
    let referenced_table = table_by_slug.get(target_slug)?;

    let on_delete = match relationship.on_delete {
        Some(OnDeleteRule::Cascade) => ForeignKeyAction::Cascade,
        Some(OnDeleteRule::Restrict) => ForeignKeyAction::Restrict,
        Some(OnDeleteRule::SetNull) => ForeignKeyAction::SetNull,
        None if relationship.required => ForeignKeyAction::Restrict,
        None => ForeignKeyAction::SetNull,
    };

    Some(ForeignKeySnapshot {
        constraint_name: format!("fk_{}_{}", table, field.name),
        column: field.name.clone(),
        referenced_table: (*referenced_table).to_string(),
        referenced_column: "id".to_string(),
        on_delete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use momentum_types::{
        CollectionIndex, ContainerField, DataField, Field, RelationTarget, RelationshipField,
        SoftDeleteConfig, VersionsConfig,
    };

    fn text(name: &str, required: bool) -> Field {
        Field::Text(DataField {
            name: name.to_string(),
            required,
        })
    }

    fn collection(slug: &str, fields: Vec<Field>) -> Collection {
        Collection {
            slug: slug.to_string(),
            db_name: None,
            fields,
            timestamps: true,
            versions: None,
            soft_delete: None,
            indexes: Vec::new(),
        }
    }

    #[test]
    fn test_auto_columns_postgres() {
        let posts = collection("posts", vec![text("title", true), text("body", false)]);
        let snapshot = snapshot_from_collections(&[posts], Dialect::PostgreSQL);

        let table = snapshot.table("posts").unwrap();
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "createdAt", "updatedAt", "title", "body"]);

        let id = &table.columns[0];
        assert_eq!(id.column_type, "VARCHAR(36)");
        assert!(id.is_primary_key);
        assert!(!id.nullable);

        let title = table.columns.iter().find(|c| c.name == "title").unwrap();
        assert_eq!(title.column_type, "TEXT");
        assert!(!title.nullable);

        let body = table.columns.iter().find(|c| c.name == "body").unwrap();
        assert!(body.nullable);
    }

    #[test]
    fn test_timestamps_disabled() {
        let mut posts = collection("posts", vec![]);
        posts.timestamps = false;
        let snapshot = snapshot_from_collections(&[posts], Dialect::SQLite);
        let table = snapshot.table("posts").unwrap();
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].name, "id");
    }

    #[test]
    fn test_drafts_add_status_column() {
        let mut posts = collection("posts", vec![]);
        posts.versions = Some(VersionsConfig { drafts: true });
        let snapshot = snapshot_from_collections(&[posts], Dialect::PostgreSQL);

        let table = snapshot.table("posts").unwrap();
        let status = table.columns.iter().find(|c| c.name == "_status").unwrap();
        assert_eq!(status.column_type, "VARCHAR(20)");
        assert_eq!(status.default_value.as_deref(), Some("'draft'"));
        assert!(!status.nullable);
    }

    #[test]
    fn test_soft_delete_column_and_index() {
        let mut posts = collection("posts", vec![]);
        posts.soft_delete = Some(SoftDeleteConfig::default());
        let snapshot = snapshot_from_collections(&[posts], Dialect::PostgreSQL);

        let table = snapshot.table("posts").unwrap();
        let deleted = table.columns.iter().find(|c| c.name == "deletedAt").unwrap();
        assert_eq!(deleted.column_type, "TIMESTAMPTZ");
        assert!(deleted.nullable);

        assert_eq!(table.indexes.len(), 1);
        assert_eq!(table.indexes[0].name, "idx_posts_deletedAt");
        assert!(!table.indexes[0].unique);
    }

    #[test]
    fn test_explicit_index_default_name() {
        let mut posts = collection("posts", vec![text("slug", true), text("locale", true)]);
        posts.indexes = vec![CollectionIndex {
            name: None,
            columns: vec!["slug".to_string(), "locale".to_string()],
            unique: true,
        }];
        let snapshot = snapshot_from_collections(&[posts], Dialect::SQLite);
        let table = snapshot.table("posts").unwrap();
        assert_eq!(table.indexes[0].name, "idx_posts_slug_locale");
        assert!(table.indexes[0].unique);
    }

    #[test]
    fn test_relationship_fk_mapping() {
        let users = collection("users", vec![]);
        let mut posts = collection(
            "posts",
            vec![
                Field::Relationship(RelationshipField {
                    name: "author".to_string(),
                    required: true,
                    relation_to: RelationTarget::Collection("users".to_string()),
                    has_many: false,
                    on_delete: None,
                }),
                Field::Relationship(RelationshipField {
                    name: "reviewer".to_string(),
                    required: false,
                    relation_to: RelationTarget::Collection("users".to_string()),
                    has_many: false,
                    on_delete: None,
                }),
                Field::Relationship(RelationshipField {
                    name: "parent".to_string(),
                    required: false,
                    relation_to: RelationTarget::Collection("posts".to_string()),
                    has_many: false,
                    on_delete: Some(OnDeleteRule::Cascade),
                }),
                // hasMany and polymorphic relationships never emit FKs
                Field::Relationship(RelationshipField {
                    name: "tags".to_string(),
                    required: false,
                    relation_to: RelationTarget::Collection("tags".to_string()),
                    has_many: true,
                    on_delete: None,
                }),
                Field::Relationship(RelationshipField {
                    name: "subject".to_string(),
                    required: false,
                    relation_to: RelationTarget::Polymorphic(vec![
                        "users".to_string(),
                        "posts".to_string(),
                    ]),
                    has_many: false,
                    on_delete: None,
                }),
            ],
        );
        posts.db_name = Some("cms_posts".to_string());

        let snapshot = snapshot_from_collections(&[users, posts], Dialect::PostgreSQL);
        let table = snapshot.table("cms_posts").unwrap();

        // subject still gets a column, just no referential integrity
        assert!(table.columns.iter().any(|c| c.name == "subject"));

        let fks: HashMap<&str, &ForeignKeySnapshot> = table
            .foreign_keys
            .iter()
            .map(|fk| (fk.column.as_str(), fk))
            .collect();
        assert_eq!(fks.len(), 3);

        let author = fks["author"];
        assert_eq!(author.constraint_name, "fk_cms_posts_author");
        assert_eq!(author.referenced_table, "users");
        assert_eq!(author.on_delete, ForeignKeyAction::Restrict);

        assert_eq!(fks["reviewer"].on_delete, ForeignKeyAction::SetNull);
        assert_eq!(fks["parent"].on_delete, ForeignKeyAction::Cascade);
        assert_eq!(fks["parent"].referenced_table, "cms_posts");
    }

    #[test]
    fn test_unknown_relation_target_skips_fk() {
        let posts = collection(
            "posts",
            vec![Field::Relationship(RelationshipField {
                name: "orphan".to_string(),
                required: false,
                relation_to: RelationTarget::Collection("missing".to_string()),
                has_many: false,
                on_delete: None,
            })],
        );
        let snapshot = snapshot_from_collections(&[posts], Dialect::SQLite);
        let table = snapshot.table("posts").unwrap();
        assert!(table.foreign_keys.is_empty());
        assert!(table.columns.iter().any(|c| c.name == "orphan"));
    }

    #[test]
    fn test_versions_table() {
        let mut posts = collection("posts", vec![text("title", true)]);
        posts.versions = Some(VersionsConfig { drafts: true });
        let snapshot = snapshot_from_collections(&[posts], Dialect::PostgreSQL);

        let versions = snapshot.table("posts_versions").unwrap();
        let names: Vec<&str> = versions.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "parent",
                "version",
                "_status",
                "autosave",
                "publishedAt",
                "createdAt",
                "updatedAt"
            ]
        );
        // version metadata only - no flattened data columns from the base table
        assert!(!names.contains(&"title"));

        assert_eq!(versions.foreign_keys.len(), 1);
        let fk = &versions.foreign_keys[0];
        assert_eq!(fk.constraint_name, "fk_posts_versions_parent");
        assert_eq!(fk.referenced_table, "posts");
        assert_eq!(fk.on_delete, ForeignKeyAction::Cascade);

        let index_names: Vec<&str> = versions.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            index_names,
            vec![
                "idx_posts_versions_parent",
                "idx_posts_versions__status",
                "idx_posts_versions_createdAt"
            ]
        );
        assert!(versions.indexes.iter().all(|i| !i.unique));
    }

    #[test]
    fn test_layout_fields_flattened_into_columns() {
        let posts = collection(
            "posts",
            vec![Field::Row(ContainerField {
                fields: vec![text("left", false), text("right", false)],
            })],
        );
        let snapshot = snapshot_from_collections(&[posts], Dialect::SQLite);
        let table = snapshot.table("posts").unwrap();
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"left"));
        assert!(names.contains(&"right"));
    }
}
