//! Migration tracking ledger
//!
//! Maintains the `_momentum_migrations` table on the target database. The
//! UNIQUE constraint on `name` is the serialization point guarding against
//! double-apply; batch numbers group migrations that were applied together
//! so they roll back together.

use crate::adapter::{DatabaseAdapter, Row, row_i64, row_string};
use crate::error::{MigrateError, Result};
use chrono::Utc;
use momentum_types::Dialect;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Name of the tracking table
pub const TRACKING_TABLE: &str = "_momentum_migrations";

/// One applied-migration row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationTrackingRecord {
    pub id: String,
    pub name: String,
    pub batch: i64,
    pub checksum: String,
    pub applied_at: String,
    pub execution_ms: i64,
}

/// Ledger API over one connection
pub struct MigrationTracker<'a> {
    db: &'a dyn DatabaseAdapter,
}

impl<'a> MigrationTracker<'a> {
    #[must_use]
    pub fn new(db: &'a dyn DatabaseAdapter) -> Self {
        Self { db }
    }

    /// CREATE TABLE IF NOT EXISTS with per-dialect column types
    pub async fn ensure_tracking_table(&self) -> Result<()> {
        let sql = match self.db.dialect() {
            Dialect::PostgreSQL => format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" (
	"id" VARCHAR(36) PRIMARY KEY,
	"name" VARCHAR(255) NOT NULL UNIQUE,
	"batch" INTEGER NOT NULL,
	"checksum" VARCHAR(64) NOT NULL,
	"appliedAt" TIMESTAMPTZ NOT NULL,
	"executionMs" INTEGER NOT NULL
)"#,
                TRACKING_TABLE
            ),
            Dialect::SQLite => format!(
                r#"CREATE TABLE IF NOT EXISTS "{}" (
	"id" TEXT PRIMARY KEY,
	"name" TEXT NOT NULL UNIQUE,
	"batch" INTEGER NOT NULL,
	"checksum" TEXT NOT NULL,
	"appliedAt" TEXT NOT NULL,
	"executionMs" INTEGER NOT NULL
)"#,
                TRACKING_TABLE
            ),
        };
        self.db.execute_raw(&sql, &[]).await?;
        Ok(())
    }

    /// All applied migrations, ordered batch ASC then name ASC
    pub async fn applied_migrations(&self) -> Result<Vec<MigrationTrackingRecord>> {
        let sql = format!(
            r#"SELECT "id", "name", "batch", "checksum", "appliedAt", "executionMs" FROM "{}" ORDER BY "batch" ASC, "name" ASC"#,
            TRACKING_TABLE
        );
        let rows = self.db.query_raw(&sql, &[]).await?;
        rows.iter().map(parse_record).collect()
    }

    /// `MAX(batch) + 1`, or 1 when the ledger is empty
    pub async fn next_batch_number(&self) -> Result<i64> {
        Ok(self.latest_batch_number().await? + 1)
    }

    /// The current highest batch number, 0 when empty
    pub async fn latest_batch_number(&self) -> Result<i64> {
        let sql = format!(r#"SELECT MAX("batch") AS "batch" FROM "{}""#, TRACKING_TABLE);
        let rows = self.db.query_raw(&sql, &[]).await?;
        Ok(rows.first().and_then(|row| row_i64(row, "batch")).unwrap_or(0))
    }

    /// INSERT a new ledger row; the record's UUID is generated here
    pub async fn record_migration(
        &self,
        name: &str,
        batch: i64,
        checksum: &str,
        execution_ms: i64,
    ) -> Result<MigrationTrackingRecord> {
        let record = MigrationTrackingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            batch,
            checksum: checksum.to_string(),
            applied_at: Utc::now().to_rfc3339(),
            execution_ms,
        };

        // The explicit cast lets the timestamp bind as text on PostgreSQL
        let sql = match self.db.dialect() {
            Dialect::PostgreSQL => format!(
                r#"INSERT INTO "{}" ("id", "name", "batch", "checksum", "appliedAt", "executionMs") VALUES ($1, $2, $3, $4, $5::timestamptz, $6)"#,
                TRACKING_TABLE
            ),
            Dialect::SQLite => format!(
                r#"INSERT INTO "{}" ("id", "name", "batch", "checksum", "appliedAt", "executionMs") VALUES (?, ?, ?, ?, ?, ?)"#,
                TRACKING_TABLE
            ),
        };
        self.db
            .execute_raw(
                &sql,
                &[
                    json!(record.id),
                    json!(record.name),
                    json!(record.batch),
                    json!(record.checksum),
                    json!(record.applied_at),
                    json!(record.execution_ms),
                ],
            )
            .await?;
        Ok(record)
    }

    /// DELETE a ledger row; returns whether any row matched
    pub async fn remove_migration_record(&self, name: &str) -> Result<bool> {
        let sql = format!(
            r#"DELETE FROM "{}" WHERE "name" = {}"#,
            TRACKING_TABLE,
            self.placeholders(1)
        );
        let affected = self.db.execute_raw(&sql, &[json!(name)]).await?;
        Ok(affected > 0)
    }

    /// Rows of one batch in rollback order (name DESC)
    pub async fn migrations_by_batch(&self, batch: i64) -> Result<Vec<MigrationTrackingRecord>> {
        let sql = format!(
            r#"SELECT "id", "name", "batch", "checksum", "appliedAt", "executionMs" FROM "{}" WHERE "batch" = {} ORDER BY "name" DESC"#,
            TRACKING_TABLE,
            self.placeholders(1)
        );
        let rows = self.db.query_raw(&sql, &[json!(batch)]).await?;
        rows.iter().map(parse_record).collect()
    }

    /// Whether a migration name is recorded as applied
    pub async fn is_migration_applied(&self, name: &str) -> Result<bool> {
        let sql = format!(
            r#"SELECT "id" FROM "{}" WHERE "name" = {}"#,
            TRACKING_TABLE,
            self.placeholders(1)
        );
        let rows = self.db.query_raw(&sql, &[json!(name)]).await?;
        Ok(!rows.is_empty())
    }

    fn placeholders(&self, count: usize) -> String {
        self.db.dialect().placeholder_list(count)
    }
}

fn parse_record(row: &Row) -> Result<MigrationTrackingRecord> {
    let field = |key: &str| -> Result<String> {
        row_string(row, key)
            .ok_or_else(|| MigrateError::execution(format!("tracker row missing '{}'", key), None))
    };
    Ok(MigrationTrackingRecord {
        id: field("id")?,
        name: field("name")?,
        batch: row_i64(row, "batch")
            .ok_or_else(|| MigrateError::execution("tracker row missing 'batch'", None))?,
        checksum: field("checksum")?,
        applied_at: field("appliedAt")?,
        execution_ms: row_i64(row, "executionMs").unwrap_or(0),
    })
}
