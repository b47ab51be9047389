//! Per-migration execution context
//!
//! A [`MigrationContext`] is built per run and handed to every migration's
//! `up`/`down`. It is the only surface user migrations see: raw SQL, typed
//! queries, the data-helper toolbox, and logging.

use crate::adapter::{DatabaseAdapter, Row};
use crate::data::DataHelpers;
use crate::error::Result;
use momentum_types::Dialect;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Logging surface exposed to migrations, forwarding to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationLog;

impl MigrationLog {
    pub fn info(&self, message: &str) {
        tracing::info!(target: "momentum::migration", "{}", message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "momentum::migration", "{}", message);
    }
}

/// The surface passed into user migrations
pub struct MigrationContext<'a> {
    db: &'a dyn DatabaseAdapter,
    /// Batched data transformation helpers
    pub data: DataHelpers<'a>,
    pub log: MigrationLog,
}

impl<'a> MigrationContext<'a> {
    #[must_use]
    pub fn new(db: &'a dyn DatabaseAdapter) -> Self {
        Self {
            db,
            data: DataHelpers::new(db),
            log: MigrationLog,
        }
    }

    /// The active dialect
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.db.dialect()
    }

    /// Execute a statement without collecting a result
    pub async fn sql(&self, query: &str, params: &[Value]) -> Result<()> {
        self.db.execute_raw(query, params).await?;
        Ok(())
    }

    /// Execute a statement and collect its rows
    pub async fn query(&self, query: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.db.query_raw(query, params).await
    }

    /// Execute a statement and deserialize each row into `T`
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        query: &str,
        params: &[Value],
    ) -> Result<Vec<T>> {
        let rows = self.db.query_raw(query, params).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(Into::into))
            .collect()
    }
}
