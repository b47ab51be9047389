//! Migration discovery and the migration unit
//!
//! A migration is anything implementing [`MigrationScript`]. Two sources
//! exist:
//!
//! - **SQL files** in the migrations directory, named
//!   `YYYYMMDDHHMMSS_name.sql` with `-- momentum:up` / `-- momentum:down`
//!   sections and an optional `-- momentum:meta {json}` header carrying a
//!   description and declared operations
//! - **code-registered scripts** for migrations that need the data-helper
//!   toolbox, registered on a [`MigrationSet`]
//!
//! The filename's timestamp prefix makes lexicographic order chronological,
//! so the set keeps everything sorted by name.

use crate::context::MigrationContext;
use crate::error::{MigrateError, Result};
use crate::operation::MigrationOperation;
use crate::sqlgen::is_comment_statement;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};

/// Statement separator inside SQL migration files
pub const STATEMENT_BREAKPOINT: &str = "--> statement-breakpoint";

const META_MARKER: &str = "-- momentum:meta";
const UP_MARKER: &str = "-- momentum:up";
const DOWN_MARKER: &str = "-- momentum:down";

static FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{14}_[a-zA-Z0-9_]+\.sql$").expect("valid pattern"));

/// Metadata attached to every migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Declared operations, used for danger detection before execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<MigrationOperation>>,
}

/// The migration unit executed by the runner
#[async_trait]
pub trait MigrationScript: Send + Sync {
    fn meta(&self) -> &MigrationMeta;

    /// Stable content revision, hashed into the tracker checksum
    ///
    /// SQL file migrations return their SQL text; code migrations default to
    /// the canonical JSON of their declared operations and should override
    /// this with an explicit revision string when they have none.
    fn revision(&self) -> String {
        self.meta()
            .operations
            .as_ref()
            .and_then(|ops| serde_json::to_string(ops).ok())
            .unwrap_or_default()
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()>;

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()>;
}

/// A migration loaded from a SQL file on disk
#[derive(Debug, Clone)]
pub struct SqlFileMigration {
    meta: MigrationMeta,
    up_statements: Vec<String>,
    down_statements: Vec<String>,
    revision: String,
}

impl SqlFileMigration {
    /// Parse a migration file's contents
    ///
    /// `name` is the file stem (`20240101120000_create_posts`). Both the up
    /// and down sections must be present.
    pub fn parse(name: &str, contents: &str) -> Result<Self> {
        let invalid = |reason: &str| MigrateError::InvalidMigration {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        #[derive(Clone, Copy)]
        enum Section {
            Preamble,
            Up,
            Down,
        }

        let mut description = String::new();
        let mut operations = None;
        let mut up_text: Option<String> = None;
        let mut down_text: Option<String> = None;
        let mut section = Section::Preamble;

        for line in contents.lines() {
            let trimmed = line.trim();
            if let Some(meta_json) = trimmed.strip_prefix(META_MARKER) {
                let header: MetaHeader = serde_json::from_str(meta_json.trim())
                    .map_err(|e| invalid(&format!("bad meta header: {}", e)))?;
                description = header.description.unwrap_or_default();
                operations = header.operations;
                section = Section::Preamble;
            } else if trimmed == UP_MARKER {
                up_text.get_or_insert_with(String::new);
                section = Section::Up;
            } else if trimmed == DOWN_MARKER {
                down_text.get_or_insert_with(String::new);
                section = Section::Down;
            } else {
                let buf = match section {
                    Section::Up => up_text.as_mut(),
                    Section::Down => down_text.as_mut(),
                    Section::Preamble => None,
                };
                if let Some(buf) = buf {
                    buf.push_str(line);
                    buf.push('\n');
                }
            }
        }

        let up_text = up_text.ok_or_else(|| invalid("missing '-- momentum:up' section"))?;
        let down_text = down_text.ok_or_else(|| invalid("missing '-- momentum:down' section"))?;

        let revision = format!("{}\n{}", up_text, down_text);
        Ok(Self {
            meta: MigrationMeta {
                name: name.to_string(),
                description,
                operations,
            },
            up_statements: split_statements(&up_text),
            down_statements: split_statements(&down_text),
            revision,
        })
    }

    /// The parsed forward statements
    #[must_use]
    pub fn up_statements(&self) -> &[String] {
        &self.up_statements
    }

    /// The parsed reverse statements
    #[must_use]
    pub fn down_statements(&self) -> &[String] {
        &self.down_statements
    }
}

#[async_trait]
impl MigrationScript for SqlFileMigration {
    fn meta(&self) -> &MigrationMeta {
        &self.meta
    }

    fn revision(&self) -> String {
        self.revision.clone()
    }

    async fn up(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        for statement in &self.up_statements {
            ctx.sql(statement, &[]).await?;
        }
        Ok(())
    }

    async fn down(&self, ctx: &MigrationContext<'_>) -> Result<()> {
        for statement in &self.down_statements {
            ctx.sql(statement, &[]).await?;
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaHeader {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    operations: Option<Vec<MigrationOperation>>,
}

/// Split section text into executable statements
///
/// Prefers the explicit breakpoint marker; falls back to splitting on `;`.
/// Comment-only placeholders (unsupported SQLite alterations) are dropped.
fn split_statements(text: &str) -> Vec<String> {
    let parts: Vec<String> = if text.contains(STATEMENT_BREAKPOINT) {
        text.split(STATEMENT_BREAKPOINT)
            .map(|s| s.trim().to_string())
            .collect()
    } else {
        text.split(';').map(|s| s.trim().to_string()).collect()
    };

    parts
        .into_iter()
        .filter(|s| !s.is_empty() && !is_comment_statement(s))
        .collect()
}

/// An ordered set of migrations from disk and code
#[derive(Default)]
pub struct MigrationSet {
    migrations: Vec<Arc<dyn MigrationScript>>,
}

impl MigrationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every matching SQL file from a directory
    ///
    /// A missing directory yields an empty set; a malformed file is fatal.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut set = Self::new();
        if !dir.exists() {
            return Ok(set);
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !FILE_PATTERN.is_match(file_name) {
                continue;
            }
            let name = file_name.trim_end_matches(".sql");
            let contents = std::fs::read_to_string(entry.path())?;
            let migration = SqlFileMigration::parse(name, &contents)?;
            set.register(Arc::new(migration));
        }
        Ok(set)
    }

    /// Add a migration, keeping the set sorted by name
    pub fn register(&mut self, script: Arc<dyn MigrationScript>) {
        self.migrations.push(script);
        self.migrations.sort_by(|a, b| a.meta().name.cmp(&b.meta().name));
    }

    /// Migrations in apply order
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MigrationScript>> {
        self.migrations.iter()
    }

    /// Look up one migration by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn MigrationScript>> {
        self.migrations.iter().find(|m| m.meta().name == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.meta().name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
