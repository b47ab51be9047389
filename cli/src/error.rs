//! CLI error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collections file not found: {0}")]
    CollectionsNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Migrate(#[from] momentum_migrations::MigrateError),

    #[error("The {0} driver is not enabled in this build")]
    DriverNotEnabled(&'static str),

    #[error("Blocked by dangerous operations; re-run with --allow-dangerous to override")]
    Blocked,

    #[error("Migration run failed")]
    RunFailed,
}
