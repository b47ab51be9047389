//! rusqlite adapter for SQLite databases
//!
//! The connection sits behind a mutex because rusqlite connections are not
//! `Sync`; a migration engine issues one statement at a time anyway.
//! Cloning a file-backed database is a file copy; in-memory databases
//! cannot be cloned.

use crate::adapter::{DatabaseAdapter, Row};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use momentum_types::Dialect;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// SQLite adapter over a rusqlite connection
pub struct RusqliteAdapter {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl RusqliteAdapter {
    /// Open a file-backed database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(map_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON").map_err(map_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Open an in-memory database (no clone support)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(map_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DatabaseAdapter for RusqliteAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql).map_err(map_err)?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(|s| (*s).to_string()).collect();

        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql_value)))
            .map_err(map_err)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_err)? {
            let mut map = Row::new();
            for (i, name) in column_names.iter().enumerate() {
                let value = row.get_ref(i).map_err(map_err)?;
                map.insert(name.clone(), value_ref_to_json(value));
            }
            out.push(map);
        }
        Ok(out)
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let conn = self.lock();
        match conn.execute(sql, params_from_iter(params.iter().map(to_sql_value))) {
            Ok(affected) => Ok(affected as u64),
            // Statements like PRAGMA return rows; drain them instead
            Err(rusqlite::Error::ExecuteReturnedResults) => {
                let mut stmt = conn.prepare(sql).map_err(map_err)?;
                let mut rows = stmt
                    .query(params_from_iter(params.iter().map(to_sql_value)))
                    .map_err(map_err)?;
                while rows.next().map_err(map_err)?.is_some() {}
                Ok(0)
            }
            Err(err) => Err(map_err(err)),
        }
    }

    async fn clone_database(&self, name: &str) -> Result<String> {
        let Some(path) = &self.path else {
            return Err(MigrateError::Unsupported("cloneDatabase"));
        };
        let target = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}.db", name));
        std::fs::copy(path, &target)
            .map_err(|e| MigrateError::CloneFailed(format!("copying database file: {}", e)))?;
        Ok(target.to_string_lossy().into_owned())
    }

    async fn connect_clone(&self, name: &str) -> Result<Box<dyn DatabaseAdapter>> {
        Ok(Box::new(Self::open(name)?))
    }

    async fn drop_clone(&self, name: &str) -> Result<()> {
        std::fs::remove_file(name)
            .map_err(|e| MigrateError::CloneFailed(format!("removing clone file: {}", e)))
    }
}

/// Extended result codes end up in `error_code`, mirroring SQLSTATE capture
/// on the PostgreSQL side.
fn map_err(err: rusqlite::Error) -> MigrateError {
    match &err {
        rusqlite::Error::SqliteFailure(ffi_err, message) => MigrateError::execution(
            message.clone().unwrap_or_else(|| ffi_err.to_string()),
            Some(ffi_err.extended_code.to_string()),
        ),
        other => MigrateError::execution(other.to_string(), None),
    }
}

fn to_sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as SqlValue;
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(String::from_utf8_lossy(blob).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_query_and_execute() {
        let db = RusqliteAdapter::open_in_memory().unwrap();
        db.execute_raw("CREATE TABLE t (\"id\" INTEGER, \"name\" TEXT)", &[])
            .await
            .unwrap();
        let affected = db
            .execute_raw("INSERT INTO t VALUES (?, ?)", &[json!(1), json!("one")])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = db
            .query_raw("SELECT \"id\", \"name\" FROM t", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("one"));
    }

    #[tokio::test]
    async fn test_error_carries_extended_code() {
        let db = RusqliteAdapter::open_in_memory().unwrap();
        db.execute_raw("CREATE TABLE t (\"id\" TEXT PRIMARY KEY)", &[])
            .await
            .unwrap();
        db.execute_raw("INSERT INTO t VALUES ('a')", &[]).await.unwrap();

        let err = db
            .execute_raw("INSERT INTO t VALUES ('a')", &[])
            .await
            .unwrap_err();
        // SQLITE_CONSTRAINT_PRIMARYKEY = 1555
        assert_eq!(err.error_code(), Some("1555"));
    }

    #[tokio::test]
    async fn test_in_memory_cannot_clone() {
        let db = RusqliteAdapter::open_in_memory().unwrap();
        let err = db.clone_database("_mig_clone_x").await.unwrap_err();
        assert!(matches!(err, MigrateError::Unsupported(_)));
    }
}
