//! Momentum Migrations - the schema migration engine
//!
//! This crate turns declarative collection configs into a safe, ordered
//! sequence of schema changes and applies them to PostgreSQL or SQLite:
//!
//! - Snapshots model a schema from two sources: collection configs
//!   (desired) and live-database introspection (actual)
//! - The diff engine emits ordered [`MigrationOperation`]s, including
//!   heuristic column-rename detection
//! - The danger detector classifies operations by risk and gates execution
//! - The runner applies migrations batch-wise against the
//!   `_momentum_migrations` ledger, and the clone-test-apply pipeline
//!   rehearses every batch on a throwaway database copy first
//!
//! # Generating operations
//!
//! ```ignore
//! use momentum_migrations::{diff_snapshots, snapshot_from_collections, DiffOptions};
//! use momentum_migrations::introspect::introspect_schema;
//!
//! let desired = snapshot_from_collections(&collections, db.dialect());
//! let actual = introspect_schema(&db).await?;
//! let diff = diff_snapshots(&actual, &desired, &DiffOptions::default());
//! for line in &diff.summary {
//!     println!("{line}");
//! }
//! ```
//!
//! # Running migrations
//!
//! ```ignore
//! use momentum_migrations::{clone_test_apply, CloneTestApplyOptions, MigrationSet};
//!
//! let set = MigrationSet::from_dir(Path::new("./migrations"))?;
//! let result = clone_test_apply(&db, &set, &CloneTestApplyOptions::default()).await;
//! ```

pub mod adapter;
pub mod adapters;
pub mod collections;
pub mod context;
pub mod danger;
pub mod data;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod loader;
pub mod operation;
pub mod pipeline;
pub mod runner;
pub mod snapshot;
pub mod snapshot_store;
pub mod sqlgen;
pub mod tracker;

pub use adapter::{DatabaseAdapter, Row};
pub use collections::snapshot_from_collections;
pub use context::{MigrationContext, MigrationLog};
pub use danger::{DangerReport, DangerSeverity, DangerWarning, detect_dangers};
pub use data::{
    BackfillOptions, ColumnMapping, DataHelpers, DedupStrategy, SplitTarget, TransformOptions,
};
pub use diff::{DiffOptions, SchemaDiffResult, diff_snapshots};
pub use error::{MigrateError, Result};
pub use loader::{MigrationMeta, MigrationScript, MigrationSet, SqlFileMigration};
pub use operation::{ColumnDef, MigrationOperation};
pub use pipeline::{
    CloneTestApplyOptions, CloneTestApplyResult, PipelinePhase, clone_test_apply,
};
pub use runner::{
    MigrateResult, MigrationRunResult, MigrationRunner, MigrationState, MigrationStatus,
    RunOptions,
};
pub use snapshot::{
    ColumnSnapshot, DatabaseSchemaSnapshot, ForeignKeyAction, ForeignKeySnapshot, IndexSnapshot,
    TableSnapshot,
};
pub use snapshot_store::SnapshotStore;
pub use sqlgen::{operations_to_down_sql, operations_to_up_sql};
pub use tracker::{MigrationTracker, MigrationTrackingRecord, TRACKING_TABLE};

// Re-export the config types the engine consumes
pub use momentum_types as types;
pub use momentum_types::{Collection, Dialect, Field};
