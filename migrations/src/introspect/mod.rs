//! Live-database introspection
//!
//! Builds the actual-schema snapshot from catalog queries, per dialect.
//! Both implementations drive the generic [`DatabaseAdapter`] rather than a
//! concrete driver, and both drop the engine's internal tables from their
//! output.

pub mod postgres;
pub mod sqlite;

use crate::adapter::DatabaseAdapter;
use crate::error::Result;
use crate::snapshot::DatabaseSchemaSnapshot;
use momentum_types::Dialect;

/// Default PostgreSQL schema to introspect
pub const DEFAULT_PG_SCHEMA: &str = "public";

/// Introspect the connected database into a snapshot
pub async fn introspect_schema(db: &dyn DatabaseAdapter) -> Result<DatabaseSchemaSnapshot> {
    match db.dialect() {
        Dialect::PostgreSQL => postgres::introspect(db, DEFAULT_PG_SCHEMA).await,
        Dialect::SQLite => sqlite::introspect(db).await,
    }
}
