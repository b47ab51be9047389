//! Built-in driver adapters
//!
//! Each submodule implements [`crate::adapter::DatabaseAdapter`] for one
//! driver and is enabled by the matching cargo feature.

#[cfg(feature = "rusqlite")]
pub mod rusqlite;

#[cfg(feature = "tokio-postgres")]
pub mod tokio_postgres;

#[cfg(feature = "rusqlite")]
pub use rusqlite::RusqliteAdapter;

#[cfg(feature = "tokio-postgres")]
pub use tokio_postgres::TokioPostgresAdapter;
