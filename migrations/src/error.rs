//! Engine error types

use thiserror::Error;

/// Errors raised by the migration engine
///
/// Validation failures (bad migration file, bad snapshot, bad config)
/// propagate as errors because they indicate misuse. Per-migration execution
/// failures are captured into structured results by the runner instead; see
/// `runner::MigrateResult`.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Invalid migration '{name}': {reason}")]
    InvalidMigration { name: String, reason: String },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A driver error surfaced mid-statement. `code` carries the SQLSTATE
    /// for PostgreSQL, or the extended result code for SQLite.
    #[error("{message}")]
    Execution {
        message: String,
        code: Option<String>,
    },

    #[error("Clone operation failed: {0}")]
    CloneFailed(String),

    #[error("Missing migration file: {0}")]
    MissingMigration(String),

    #[error("{0} is not supported by this adapter")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Build an execution failure with an optional driver error code
    pub fn execution(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            code,
        }
    }

    /// The driver error code, when this is an execution failure that has one
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Execution { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Engine result alias
pub type Result<T> = std::result::Result<T, MigrateError>;
