//! Field-to-SQL column type mapping and type normalization
//!
//! Catalog queries return dialect-flavored spellings of the same type
//! (`character varying(255)` vs `VARCHAR(255)`, `INT` vs `INTEGER`).
//! Everything that compares types does so through [`normalize_type`] so the
//! diff engine never sees those spellings as a change.

use crate::dialect::Dialect;
use crate::field::FieldKind;

/// SQL column type for a flattened field
#[must_use]
pub fn sql_type_for_field(kind: FieldKind, dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::PostgreSQL => match kind {
            FieldKind::Text | FieldKind::Textarea | FieldKind::RichText => "TEXT",
            FieldKind::Email | FieldKind::Slug | FieldKind::Select => "VARCHAR(255)",
            FieldKind::Number => "NUMERIC",
            FieldKind::Checkbox => "BOOLEAN",
            FieldKind::Date => "TIMESTAMPTZ",
            FieldKind::Relationship | FieldKind::Upload => "VARCHAR(36)",
            FieldKind::Array | FieldKind::Group | FieldKind::Blocks | FieldKind::Json => "JSONB",
        },
        Dialect::SQLite => match kind {
            FieldKind::Number => "REAL",
            FieldKind::Checkbox => "INTEGER",
            _ => "TEXT",
        },
    }
}

/// Normalize a catalog-returned type name to its canonical comparison form
///
/// PostgreSQL: `CHARACTER VARYING(n)` becomes `VARCHAR(n)`, `TIMESTAMP WITH
/// TIME ZONE` becomes `TIMESTAMPTZ`. SQLite: `INT` becomes `INTEGER`. All
/// output is uppercase with collapsed whitespace.
#[must_use]
pub fn normalize_type(raw: &str, dialect: Dialect) -> String {
    let upper = raw.trim().to_uppercase();
    let collapsed = collapse_whitespace(&upper);

    match dialect {
        Dialect::PostgreSQL => {
            let renamed = collapsed
                .replace("CHARACTER VARYING", "VARCHAR")
                .replace("TIMESTAMP WITH TIME ZONE", "TIMESTAMPTZ")
                .replace("TIMESTAMP WITHOUT TIME ZONE", "TIMESTAMP")
                .replace("DOUBLE PRECISION", "DOUBLE");
            match renamed.as_str() {
                "INT" | "INT4" => "INTEGER".to_string(),
                "INT8" => "BIGINT".to_string(),
                "INT2" => "SMALLINT".to_string(),
                "BOOL" => "BOOLEAN".to_string(),
                _ => renamed,
            }
        }
        Dialect::SQLite => match collapsed.as_str() {
            "INT" => "INTEGER".to_string(),
            other => other.to_string(),
        },
    }
}

/// Whether two type names are the same type after normalization
#[must_use]
pub fn are_types_compatible(a: &str, b: &str, dialect: Dialect) -> bool {
    normalize_type(a, dialect) == normalize_type(b, dialect)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
