//! Reusable data transformations for migrations
//!
//! These helpers run inside user migrations through the context and take
//! care of dialect differences: placeholder syntax (`$1` vs `?`), the
//! physical row identifier used for batching (`ctid` vs `rowid`), and the
//! JSON function families.

use crate::adapter::DatabaseAdapter;
use crate::error::{MigrateError, Result};
use crate::sqlgen::quote_ident;
use momentum_types::Dialect;
use serde_json::Value;

/// Options for [`DataHelpers::backfill`]
#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Extra filter ANDed onto the implicit `column IS NULL`
    pub where_clause: Option<String>,
    pub batch_size: usize,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            where_clause: None,
            batch_size: 1000,
        }
    }
}

/// Options for [`DataHelpers::transform`]
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Filter selecting the rows to transform. Batched mode requires one
    /// that excludes already-transformed rows, since it is what makes each
    /// round shrink.
    pub where_clause: Option<String>,
    /// 0 runs a single unbatched UPDATE
    pub batch_size: usize,
}

/// One target column of [`DataHelpers::split_column`]
#[derive(Debug, Clone)]
pub struct SplitTarget {
    pub name: String,
    pub column_type: String,
    /// SQL expression over the source row producing the target value
    pub expression: String,
}

/// One column mapping of [`DataHelpers::copy_data`]
///
/// `source` may be a plain column name (quoted automatically) or any SQL
/// expression over the source table.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub target: String,
    pub source: String,
}

/// Which duplicate row [`DataHelpers::dedup`] keeps per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupStrategy {
    /// Keep the row with the greatest `createdAt`
    #[default]
    Latest,
    /// Keep the row with the smallest `createdAt`
    Earliest,
    /// Keep the physically-first row
    First,
}

/// The helper toolbox, bound to one connection
pub struct DataHelpers<'a> {
    db: &'a dyn DatabaseAdapter,
}

impl<'a> DataHelpers<'a> {
    #[must_use]
    pub fn new(db: &'a dyn DatabaseAdapter) -> Self {
        Self { db }
    }

    fn dialect(&self) -> Dialect {
        self.db.dialect()
    }

    /// Batched UPDATE of NULL values to a constant
    ///
    /// Returns the total number of rows updated.
    pub async fn backfill(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        options: &BackfillOptions,
    ) -> Result<u64> {
        let batch = options.batch_size.max(1);
        let rid = self.dialect().row_id_column();
        let t = quote_ident(table);
        let c = quote_ident(column);

        let mut filter = format!("{} IS NULL", c);
        if let Some(clause) = &options.where_clause {
            filter.push_str(&format!(" AND ({})", clause));
        }

        let sql = format!(
            "UPDATE {t} SET {c} = {ph} WHERE {rid} IN (SELECT {rid} FROM {t} WHERE {filter} LIMIT {batch})",
            t = t,
            c = c,
            ph = self.dialect().placeholder(1),
            rid = rid,
            filter = filter,
            batch = batch,
        );

        let mut total = 0u64;
        loop {
            let affected = self
                .db
                .execute_raw(&sql, std::slice::from_ref(value))
                .await?;
            total += affected;
            if (affected as usize) < batch {
                break;
            }
        }
        Ok(total)
    }

    /// UPDATE a column with a SQL expression, optionally batched
    ///
    /// Batched mode addresses rows through the physical row identifier, the
    /// same pattern as [`Self::backfill`]: re-run one LIMITed UPDATE until a
    /// round affects fewer rows than the batch size. The caller's
    /// `where_clause` is what shrinks each round - it must exclude rows the
    /// expression has already transformed - so batching without one is
    /// rejected.
    pub async fn transform(
        &self,
        table: &str,
        column: &str,
        expression: &str,
        options: &TransformOptions,
    ) -> Result<u64> {
        let t = quote_ident(table);
        let c = quote_ident(column);

        if options.batch_size == 0 {
            let where_sql = options
                .where_clause
                .as_ref()
                .map(|w| format!(" WHERE {}", w))
                .unwrap_or_default();
            return self
                .db
                .execute_raw(
                    &format!("UPDATE {} SET {} = {}{}", t, c, expression, where_sql),
                    &[],
                )
                .await;
        }

        let Some(filter) = options.where_clause.as_deref() else {
            return Err(MigrateError::InvalidConfig(
                "batched transform needs a where clause that excludes already-transformed rows"
                    .to_string(),
            ));
        };

        let batch = options.batch_size;
        let rid = self.dialect().row_id_column();
        let sql = format!(
            "UPDATE {t} SET {c} = {expr} WHERE {rid} IN (SELECT {rid} FROM {t} WHERE {filter} LIMIT {batch})",
            t = t,
            c = c,
            expr = expression,
            rid = rid,
            filter = filter,
            batch = batch,
        );

        let mut total = 0u64;
        loop {
            let affected = self.db.execute_raw(&sql, &[]).await?;
            total += affected;
            if (affected as usize) < batch {
                break;
            }
        }
        Ok(total)
    }

    /// Safe three-step rename: add the new column, copy, drop the old one
    ///
    /// Works on every dialect, unlike in-place ALTERs.
    pub async fn rename_column(
        &self,
        table: &str,
        from: &str,
        to: &str,
        column_type: &str,
    ) -> Result<()> {
        let t = quote_ident(table);
        self.db
            .execute_raw(
                &format!("ALTER TABLE {} ADD COLUMN {} {}", t, quote_ident(to), column_type),
                &[],
            )
            .await?;
        self.db
            .execute_raw(
                &format!("UPDATE {} SET {} = {}", t, quote_ident(to), quote_ident(from)),
                &[],
            )
            .await?;
        self.db
            .execute_raw(
                &format!("ALTER TABLE {} DROP COLUMN {}", t, quote_ident(from)),
                &[],
            )
            .await?;
        Ok(())
    }

    /// Split one column into several: add targets, populate, drop the source
    pub async fn split_column(
        &self,
        table: &str,
        source: &str,
        targets: &[SplitTarget],
    ) -> Result<()> {
        let t = quote_ident(table);
        for target in targets {
            self.db
                .execute_raw(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        t,
                        quote_ident(&target.name),
                        target.column_type
                    ),
                    &[],
                )
                .await?;
            self.db
                .execute_raw(
                    &format!(
                        "UPDATE {} SET {} = {}",
                        t,
                        quote_ident(&target.name),
                        target.expression
                    ),
                    &[],
                )
                .await?;
        }
        self.db
            .execute_raw(
                &format!("ALTER TABLE {} DROP COLUMN {}", t, quote_ident(source)),
                &[],
            )
            .await?;
        Ok(())
    }

    /// Merge several columns into one: add the target, populate, drop sources
    pub async fn merge_columns(
        &self,
        table: &str,
        sources: &[&str],
        target: &str,
        target_type: &str,
        expression: &str,
    ) -> Result<()> {
        let t = quote_ident(table);
        self.db
            .execute_raw(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    t,
                    quote_ident(target),
                    target_type
                ),
                &[],
            )
            .await?;
        self.db
            .execute_raw(
                &format!("UPDATE {} SET {} = {}", t, quote_ident(target), expression),
                &[],
            )
            .await?;
        for source in sources {
            self.db
                .execute_raw(
                    &format!("ALTER TABLE {} DROP COLUMN {}", t, quote_ident(source)),
                    &[],
                )
                .await?;
        }
        Ok(())
    }

    /// INSERT ... SELECT with a column mapping
    pub async fn copy_data(
        &self,
        source: &str,
        target: &str,
        mapping: &[ColumnMapping],
        where_clause: Option<&str>,
    ) -> Result<u64> {
        let targets = mapping
            .iter()
            .map(|m| quote_ident(&m.target))
            .collect::<Vec<_>>()
            .join(", ");
        let selects = mapping
            .iter()
            .map(|m| source_expression(&m.source))
            .collect::<Vec<_>>()
            .join(", ");
        let where_sql = where_clause
            .map(|w| format!(" WHERE {}", w))
            .unwrap_or_default();

        self.db
            .execute_raw(
                &format!(
                    "INSERT INTO {} ({}) SELECT {} FROM {}{}",
                    quote_ident(target),
                    targets,
                    selects,
                    quote_ident(source),
                    where_sql
                ),
                &[],
            )
            .await
    }

    /// Fold a scalar column into a key of a JSON column
    pub async fn column_to_json(
        &self,
        table: &str,
        column: &str,
        json_column: &str,
        key: &str,
    ) -> Result<u64> {
        let t = quote_ident(table);
        let c = quote_ident(column);
        let j = quote_ident(json_column);
        let sql = match self.dialect() {
            Dialect::PostgreSQL => format!(
                "UPDATE {t} SET {j} = jsonb_set(COALESCE({j}, '{{}}'::jsonb), '{{{key}}}', to_jsonb({c}))",
            ),
            Dialect::SQLite => format!(
                "UPDATE {t} SET {j} = json_set(COALESCE({j}, '{{}}'), '$.{key}', {c})",
            ),
        };
        self.db.execute_raw(&sql, &[]).await
    }

    /// Extract a key of a JSON column into a scalar column
    pub async fn json_to_column(
        &self,
        table: &str,
        json_column: &str,
        key: &str,
        column: &str,
    ) -> Result<u64> {
        let t = quote_ident(table);
        let c = quote_ident(column);
        let j = quote_ident(json_column);
        let sql = match self.dialect() {
            Dialect::PostgreSQL => format!("UPDATE {t} SET {c} = {j}->>'{key}'"),
            Dialect::SQLite => format!("UPDATE {t} SET {c} = json_extract({j}, '$.{key}')"),
        };
        self.db.execute_raw(&sql, &[]).await
    }

    /// Delete duplicate rows, keeping one per group of `columns`
    ///
    /// Returns the number of rows deleted.
    pub async fn dedup(
        &self,
        table: &str,
        columns: &[&str],
        strategy: DedupStrategy,
    ) -> Result<u64> {
        let t = quote_ident(table);
        let cols = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = match self.dialect() {
            Dialect::PostgreSQL => {
                let order = match strategy {
                    DedupStrategy::Latest => format!("{}, {} DESC", cols, quote_ident("createdAt")),
                    DedupStrategy::Earliest => format!("{}, {} ASC", cols, quote_ident("createdAt")),
                    DedupStrategy::First => format!("{}, ctid ASC", cols),
                };
                format!(
                    "DELETE FROM {t} WHERE ctid NOT IN (SELECT DISTINCT ON ({cols}) ctid FROM {t} ORDER BY {order})",
                )
            }
            Dialect::SQLite => {
                // Bare-column semantics: MIN/MAX makes the selected rowid come
                // from the same row that holds the extreme value.
                let keeper = match strategy {
                    DedupStrategy::Latest => format!(
                        "SELECT rowid FROM (SELECT rowid, MAX({}) FROM {t} GROUP BY {cols})",
                        quote_ident("createdAt"),
                    ),
                    DedupStrategy::Earliest => format!(
                        "SELECT rowid FROM (SELECT rowid, MIN({}) FROM {t} GROUP BY {cols})",
                        quote_ident("createdAt"),
                    ),
                    DedupStrategy::First => {
                        format!("SELECT MIN(rowid) FROM {t} GROUP BY {cols}")
                    }
                };
                format!("DELETE FROM {t} WHERE rowid NOT IN ({keeper})")
            }
        };
        self.db.execute_raw(&sql, &[]).await
    }
}

/// Quote plain column names; leave expressions untouched
fn source_expression(source: &str) -> String {
    let is_plain_identifier = !source.is_empty()
        && !source.starts_with(|c: char| c.is_ascii_digit())
        && source.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if is_plain_identifier {
        quote_ident(source)
    } else {
        source.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_expression_quotes_identifiers() {
        assert_eq!(source_expression("title"), "\"title\"");
        assert_eq!(source_expression("created_at"), "\"created_at\"");
        assert_eq!(source_expression("UPPER(title)"), "UPPER(title)");
        assert_eq!(source_expression("a || b"), "a || b");
    }
}
