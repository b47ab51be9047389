//! Declarative collection configuration
//!
//! A collection describes one content type and maps to one table (plus an
//! optional `_versions` side table). Configs are plain data and deserialize
//! from JSON, so they can be produced by any front-end.

use crate::field::Field;
use serde::{Deserialize, Serialize};

/// One collection config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Stable identifier, also the default table name
    pub slug: String,
    /// Explicit table name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Emit `createdAt` / `updatedAt` columns (on by default)
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete: Option<SoftDeleteConfig>,
    #[serde(default)]
    pub indexes: Vec<CollectionIndex>,
}

impl Collection {
    /// The table this collection is stored in
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.db_name.as_deref().unwrap_or(&self.slug)
    }

    /// Name of the versions side table, when versioning is enabled
    #[must_use]
    pub fn versions_table_name(&self) -> String {
        format!("{}_versions", self.table_name())
    }
}

/// Versioning options for a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsConfig {
    /// Draft workflow: adds the `_status` column to the base table
    #[serde(default)]
    pub drafts: bool,
}

/// Soft-delete options for a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftDeleteConfig {
    /// Column holding the deletion timestamp
    #[serde(default = "default_soft_delete_field")]
    pub field: String,
}

impl Default for SoftDeleteConfig {
    fn default() -> Self {
        Self {
            field: default_soft_delete_field(),
        }
    }
}

/// An explicit collection-level index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionIndex {
    /// Defaults to `idx_{table}_{columns joined by _}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

fn default_true() -> bool {
    true
}

fn default_soft_delete_field() -> String {
    "deletedAt".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_prefers_db_name() {
        let json = r#"{"slug":"posts","dbName":"cms_posts"}"#;
        let collection: Collection = serde_json::from_str(json).unwrap();
        assert_eq!(collection.table_name(), "cms_posts");
        assert_eq!(collection.versions_table_name(), "cms_posts_versions");
    }

    #[test]
    fn test_defaults() {
        let collection: Collection = serde_json::from_str(r#"{"slug":"posts"}"#).unwrap();
        assert!(collection.timestamps);
        assert!(collection.versions.is_none());
        assert!(collection.soft_delete.is_none());
        assert!(collection.indexes.is_empty());
    }

    #[test]
    fn test_soft_delete_default_field() {
        let collection: Collection =
            serde_json::from_str(r#"{"slug":"posts","softDelete":{}}"#).unwrap();
        assert_eq!(collection.soft_delete.unwrap().field, "deletedAt");
    }
}
