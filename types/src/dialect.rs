//! SQL dialect selection
//!
//! Every dialect-sensitive choice the engine makes lives here as a method,
//! so callers ask the dialect instead of matching on it: how bind
//! parameters are spelled, which physical row identifier batched updates
//! address, and whether a column can be altered in place at all.

use serde::{Deserialize, Serialize};

/// A supported SQL dialect
///
/// # Examples
///
/// ```
/// use momentum_types::Dialect;
///
/// assert_eq!(Dialect::PostgreSQL.placeholder(2), "$2");
/// assert_eq!(Dialect::SQLite.placeholder(2), "?");
/// assert_eq!(Dialect::PostgreSQL.row_id_column(), "ctid");
/// assert!(!Dialect::SQLite.supports_column_alteration());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    SQLite,
    PostgreSQL,
}

impl Dialect {
    /// Spelling of the bind parameter at 1-based position `n`
    #[must_use]
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::PostgreSQL => format!("${}", n),
            Dialect::SQLite => "?".to_string(),
        }
    }

    /// Comma-separated placeholder list for `count` parameters
    #[must_use]
    pub fn placeholder_list(&self, count: usize) -> String {
        (1..=count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Physical row identifier usable in subselects
    ///
    /// Batched data helpers address rows through this instead of a primary
    /// key, since migrations run against tables whose key shape is unknown.
    #[must_use]
    pub const fn row_id_column(&self) -> &'static str {
        match self {
            Dialect::PostgreSQL => "ctid",
            Dialect::SQLite => "rowid",
        }
    }

    /// Whether `ALTER TABLE ... ALTER COLUMN` can change a column's type,
    /// nullability, or default in place
    ///
    /// SQLite needs a full table rebuild for any of these; the SQL
    /// generator emits comment placeholders and the danger detector flags
    /// the operation as an error there.
    #[must_use]
    pub const fn supports_column_alteration(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Lowercase dialect name, as stored in snapshots and config files
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Dialect {
    type Err = DialectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::SQLite),
            "postgresql" | "postgres" | "pg" => Ok(Dialect::PostgreSQL),
            other => Err(DialectParseError(other.to_string())),
        }
    }
}

/// Error for an unrecognized dialect name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized dialect '{0}'")]
pub struct DialectParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_spelling() {
        assert_eq!(Dialect::PostgreSQL.placeholder(1), "$1");
        assert_eq!(Dialect::PostgreSQL.placeholder(7), "$7");
        assert_eq!(Dialect::SQLite.placeholder(1), "?");
        assert_eq!(Dialect::SQLite.placeholder(7), "?");
    }

    #[test]
    fn test_placeholder_list() {
        assert_eq!(Dialect::PostgreSQL.placeholder_list(3), "$1, $2, $3");
        assert_eq!(Dialect::SQLite.placeholder_list(3), "?, ?, ?");
        assert_eq!(Dialect::SQLite.placeholder_list(0), "");
    }

    #[test]
    fn test_row_id_column() {
        assert_eq!(Dialect::PostgreSQL.row_id_column(), "ctid");
        assert_eq!(Dialect::SQLite.row_id_column(), "rowid");
    }

    #[test]
    fn test_column_alteration_capability() {
        assert!(Dialect::PostgreSQL.supports_column_alteration());
        assert!(!Dialect::SQLite.supports_column_alteration());
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!("sqlite".parse(), Ok(Dialect::SQLite));
        assert_eq!("SQLite".parse(), Ok(Dialect::SQLite));
        assert_eq!("postgresql".parse(), Ok(Dialect::PostgreSQL));
        assert_eq!("Postgres".parse(), Ok(Dialect::PostgreSQL));
        assert_eq!("PG".parse(), Ok(Dialect::PostgreSQL));

        let err = "mysql".parse::<Dialect>().unwrap_err();
        assert_eq!(err, DialectParseError("mysql".to_string()));
    }

    #[test]
    fn test_display_matches_snapshot_spelling() {
        assert_eq!(Dialect::SQLite.to_string(), "sqlite");
        assert_eq!(Dialect::PostgreSQL.to_string(), "postgresql");
    }

    #[test]
    fn test_serde_roundtrip() {
        assert_eq!(
            serde_json::to_string(&Dialect::PostgreSQL).unwrap(),
            "\"postgresql\""
        );
        let parsed: Dialect = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(parsed, Dialect::SQLite);
    }
}
