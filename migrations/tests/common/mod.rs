//! Shared test support: adapters and file fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use momentum_migrations::adapter::{DatabaseAdapter, Row};
use momentum_migrations::error::{MigrateError, Result};
use momentum_types::Dialect;
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// Adapter returning canned rows for queries matched by substring
///
/// Useful for introspector tests where the catalog responses are fixed.
pub struct MockAdapter {
    dialect: Dialect,
    responses: Vec<(&'static str, Vec<Row>)>,
    pub executed: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            responses: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Respond to any query containing `pattern` with `rows`
    pub fn respond(mut self, pattern: &'static str, rows: Vec<Row>) -> Self {
        self.responses.push((pattern, rows));
        self
    }
}

#[async_trait]
impl DatabaseAdapter for MockAdapter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query_raw(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn execute_raw(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(0)
    }
}

/// Wraps a real adapter and fails statements containing a trigger substring
/// with a fixed message and error code.
pub struct FailingAdapter<A> {
    inner: A,
    trigger: &'static str,
    message: &'static str,
    code: Option<&'static str>,
}

impl<A> FailingAdapter<A> {
    pub fn new(inner: A, trigger: &'static str, message: &'static str, code: Option<&'static str>) -> Self {
        Self {
            inner,
            trigger,
            message,
            code,
        }
    }

    fn check(&self, sql: &str) -> Result<()> {
        if sql.contains(self.trigger) {
            return Err(MigrateError::execution(
                self.message,
                self.code.map(String::from),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl<A: DatabaseAdapter> DatabaseAdapter for FailingAdapter<A> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.check(sql)?;
        self.inner.query_raw(sql, params).await
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.check(sql)?;
        self.inner.execute_raw(sql, params).await
    }

    async fn clone_database(&self, name: &str) -> Result<String> {
        self.inner.clone_database(name).await
    }

    /// The clone inherits the same failure injection
    async fn connect_clone(&self, name: &str) -> Result<Box<dyn DatabaseAdapter>> {
        let clone = self.inner.connect_clone(name).await?;
        Ok(Box::new(FailingAdapter {
            inner: clone,
            trigger: self.trigger,
            message: self.message,
            code: self.code,
        }))
    }

    async fn drop_clone(&self, name: &str) -> Result<()> {
        self.inner.drop_clone(name).await
    }
}

/// Write a migration file in the on-disk format the loader expects
pub fn write_migration_file(dir: &Path, name: &str, up: &str, down: &str) {
    write_migration_file_with_meta(dir, name, up, down, None);
}

pub fn write_migration_file_with_meta(
    dir: &Path,
    name: &str,
    up: &str,
    down: &str,
    meta_json: Option<&str>,
) {
    std::fs::create_dir_all(dir).unwrap();
    let mut contents = String::new();
    if let Some(meta) = meta_json {
        contents.push_str(&format!("-- momentum:meta {}\n", meta));
    }
    contents.push_str("-- momentum:up\n");
    contents.push_str(up);
    contents.push_str("\n-- momentum:down\n");
    contents.push_str(down);
    contents.push('\n');
    std::fs::write(dir.join(format!("{}.sql", name)), contents).unwrap();
}
