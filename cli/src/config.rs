//! CLI configuration (momentum.toml)
//!
//! ```toml
//! dialect = "sqlite"
//! migrationsDir = "./migrations"
//! collections = "./collections.json"
//!
//! [database]
//! url = "./dev.db"
//! # or pull the URL from the environment:
//! # env = "DATABASE_URL"
//! ```
//!
//! Relative paths are resolved against the config file's directory.

use crate::error::CliError;
use momentum_types::{Collection, Dialect};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentumConfig {
    pub dialect: Dialect,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    /// Path to the collections JSON file consumed by `generate`
    #[serde(default)]
    pub collections: Option<PathBuf>,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// Environment variable holding the URL, e.g. `DATABASE_URL`
    pub env: Option<String>,
}

impl MomentumConfig {
    /// Load the config and resolve relative paths against its directory
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Self = toml::from_str(&contents)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.migrations_dir = resolve(base, &config.migrations_dir);
        config.collections = config.collections.take().map(|p| resolve(base, &p));
        Ok(config)
    }

    /// The database URL, following the env indirection when configured
    pub fn database_url(&self) -> Result<String, CliError> {
        if let Some(url) = &self.database.url {
            return Ok(url.clone());
        }
        if let Some(var) = &self.database.env {
            return std::env::var(var).map_err(|_| {
                CliError::Config(format!("environment variable {} is not set", var))
            });
        }
        Err(CliError::Config(
            "no database url configured; add [database] url or env to momentum.toml".to_string(),
        ))
    }

    /// Whether any database connection is configured at all
    pub fn has_database(&self) -> bool {
        self.database.url.is_some() || self.database.env.is_some()
    }

    /// Parse the collections JSON file
    pub fn load_collections(&self) -> Result<Vec<Collection>, CliError> {
        let Some(path) = &self.collections else {
            return Err(CliError::Config(
                "no collections file configured; add collections = \"./collections.json\""
                    .to_string(),
            ));
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|_| CliError::CollectionsNotFound(path.display().to_string()))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("./migrations")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("momentum.toml");
        std::fs::write(
            &config_path,
            "dialect = \"sqlite\"\nmigrationsDir = \"./m\"\ncollections = \"./c.json\"\n\n[database]\nurl = \"./dev.db\"\n",
        )
        .unwrap();

        let config = MomentumConfig::load(&config_path).unwrap();
        assert_eq!(config.dialect, Dialect::SQLite);
        assert_eq!(config.migrations_dir, dir.path().join("./m"));
        assert_eq!(config.collections.clone().unwrap(), dir.path().join("./c.json"));
        assert_eq!(config.database_url().unwrap(), "./dev.db");
    }

    #[test]
    fn test_missing_url_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("momentum.toml");
        std::fs::write(&config_path, "dialect = \"postgresql\"\n").unwrap();

        let config = MomentumConfig::load(&config_path).unwrap();
        assert!(!config.has_database());
        assert!(matches!(config.database_url(), Err(CliError::Config(_))));
    }
}
