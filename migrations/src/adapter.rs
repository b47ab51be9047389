//! Database adapter contract
//!
//! The engine talks to databases exclusively through [`DatabaseAdapter`], so
//! introspection, the tracker, and the runner are driver-agnostic. Rows are
//! JSON maps: every driver can produce them, and catalog values are simple
//! scalars anyway.

use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use momentum_types::Dialect;
use serde_json::Value;

/// A result row keyed by column name
pub type Row = serde_json::Map<String, Value>;

/// Connection-level contract the engine consumes
///
/// `clone_database` / `connect_clone` / `drop_clone` are optional; adapters
/// that cannot clone (e.g. an in-memory database) keep the default
/// `Unsupported` implementations and the clone-test-apply pipeline reports
/// the failure in its `clone` phase.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// The SQL dialect this connection speaks
    fn dialect(&self) -> Dialect;

    /// Execute a statement and collect result rows
    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement, returning the number of affected rows
    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Create a throwaway copy of this database; returns the final clone name
    async fn clone_database(&self, _name: &str) -> Result<String> {
        Err(MigrateError::Unsupported("cloneDatabase"))
    }

    /// Open a connection to a clone previously created by [`Self::clone_database`]
    async fn connect_clone(&self, _name: &str) -> Result<Box<dyn DatabaseAdapter>> {
        Err(MigrateError::Unsupported("connectClone"))
    }

    /// Drop a clone previously created by [`Self::clone_database`]
    async fn drop_clone(&self, _name: &str) -> Result<()> {
        Err(MigrateError::Unsupported("dropClone"))
    }
}

#[async_trait]
impl DatabaseAdapter for Box<dyn DatabaseAdapter> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query_raw(sql, params).await
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute_raw(sql, params).await
    }

    async fn clone_database(&self, name: &str) -> Result<String> {
        (**self).clone_database(name).await
    }

    async fn connect_clone(&self, name: &str) -> Result<Box<dyn DatabaseAdapter>> {
        (**self).connect_clone(name).await
    }

    async fn drop_clone(&self, name: &str) -> Result<()> {
        (**self).drop_clone(name).await
    }
}

/// String column accessor tolerant of non-string JSON scalars
pub(crate) fn row_str<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

pub(crate) fn row_string(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

pub(crate) fn row_i64(row: &Row, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Boolean accessor understanding catalog spellings (`true`, `1`, `"YES"`)
pub(crate) fn row_bool(row: &Row, key: &str) -> Option<bool> {
    match row.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_i64().unwrap_or(0) != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "yes" | "true" | "t" | "1" => Some(true),
            "no" | "false" | "f" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
