//! Adapter construction from the CLI config

use crate::config::MomentumConfig;
use crate::error::CliError;
use momentum_migrations::DatabaseAdapter;
use momentum_types::Dialect;

/// Connect to the configured database
pub async fn connect(config: &MomentumConfig) -> Result<Box<dyn DatabaseAdapter>, CliError> {
    let url = config.database_url()?;
    match config.dialect {
        Dialect::SQLite => connect_sqlite(&url),
        Dialect::PostgreSQL => connect_postgres(&url).await,
    }
}

#[cfg(feature = "rusqlite")]
fn connect_sqlite(url: &str) -> Result<Box<dyn DatabaseAdapter>, CliError> {
    use momentum_migrations::adapters::RusqliteAdapter;
    Ok(Box::new(RusqliteAdapter::open(url)?))
}

#[cfg(not(feature = "rusqlite"))]
fn connect_sqlite(_url: &str) -> Result<Box<dyn DatabaseAdapter>, CliError> {
    Err(CliError::DriverNotEnabled("sqlite (rusqlite feature)"))
}

#[cfg(feature = "tokio-postgres")]
async fn connect_postgres(url: &str) -> Result<Box<dyn DatabaseAdapter>, CliError> {
    use momentum_migrations::adapters::TokioPostgresAdapter;
    Ok(Box::new(TokioPostgresAdapter::connect(url).await?))
}

#[cfg(not(feature = "tokio-postgres"))]
async fn connect_postgres(_url: &str) -> Result<Box<dyn DatabaseAdapter>, CliError> {
    Err(CliError::DriverNotEnabled("postgresql (tokio-postgres feature)"))
}
