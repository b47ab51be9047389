//! tokio-postgres adapter for PostgreSQL databases
//!
//! Cloning uses `CREATE DATABASE ... TEMPLATE ...` issued over a separate
//! maintenance connection (Postgres refuses to copy a database that other
//! sessions are connected to). SQLSTATE codes are captured into
//! `error_code` for the suggestion engine.

use crate::adapter::{DatabaseAdapter, Row};
use crate::error::{MigrateError, Result};
use crate::sqlgen::quote_ident;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use momentum_types::Dialect;
use serde_json::Value;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config, NoTls};

/// PostgreSQL adapter over a tokio-postgres client
pub struct TokioPostgresAdapter {
    client: Client,
    config: Config,
}

impl TokioPostgresAdapter {
    /// Connect using a `host=... user=... dbname=...` string or URL
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let config: Config = conn_str
            .parse()
            .map_err(|e: tokio_postgres::Error| MigrateError::InvalidConfig(e.to_string()))?;
        Self::connect_with(config).await
    }

    async fn connect_with(config: Config) -> Result<Self> {
        let (client, connection) = config.connect(NoTls).await.map_err(map_err)?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection task ended");
            }
        });
        Ok(Self { client, config })
    }

    /// A short-lived client against the maintenance database
    async fn maintenance_client(&self) -> Result<Client> {
        let mut config = self.config.clone();
        config.dbname("postgres");
        let (client, connection) = config.connect(NoTls).await.map_err(map_err)?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres maintenance connection ended");
            }
        });
        Ok(client)
    }

    fn current_dbname(&self) -> Result<String> {
        self.config
            .get_dbname()
            .map(String::from)
            .ok_or_else(|| MigrateError::InvalidConfig("connection has no dbname".to_string()))
    }
}

#[async_trait]
impl DatabaseAdapter for TokioPostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let boxed = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(AsRef::as_ref).collect();
        let rows = self.client.query(sql, &refs).await.map_err(map_err)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let boxed = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(AsRef::as_ref).collect();
        self.client.execute(sql, &refs).await.map_err(map_err)
    }

    async fn clone_database(&self, name: &str) -> Result<String> {
        let current = self.current_dbname()?;
        let client = self.maintenance_client().await?;
        let sql = format!(
            "CREATE DATABASE {} TEMPLATE {}",
            quote_ident(name),
            quote_ident(&current)
        );
        client
            .execute(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::CloneFailed(e.to_string()))?;
        Ok(name.to_string())
    }

    async fn connect_clone(&self, name: &str) -> Result<Box<dyn DatabaseAdapter>> {
        let mut config = self.config.clone();
        config.dbname(name);
        Ok(Box::new(Self::connect_with(config).await?))
    }

    async fn drop_clone(&self, name: &str) -> Result<()> {
        let client = self.maintenance_client().await?;
        let sql = format!("DROP DATABASE IF EXISTS {}", quote_ident(name));
        client
            .execute(sql.as_str(), &[])
            .await
            .map_err(|e| MigrateError::CloneFailed(e.to_string()))?;
        Ok(())
    }
}

fn map_err(err: tokio_postgres::Error) -> MigrateError {
    match err.as_db_error() {
        Some(db_err) => MigrateError::execution(
            db_err.message().to_string(),
            Some(db_err.code().code().to_string()),
        ),
        None => MigrateError::execution(err.to_string(), None),
    }
}

fn to_sql_params(params: &[Value]) -> Vec<Box<dyn ToSql + Sync>> {
    params.iter().map(to_sql_param).collect()
}

fn to_sql_param(value: &Value) -> Box<dyn ToSql + Sync> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Box::new(i),
            None => Box::new(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

fn row_to_json(row: &tokio_postgres::Row) -> Row {
    let mut map = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(i).ok().flatten().map(Value::from)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(i).ok().flatten().map(Value::from)
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(i).ok().flatten().map(Value::from)
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(i).ok().flatten().map(Value::from)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(i)
                .ok()
                .flatten()
                .map(|f| Value::from(f as f64))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(i).ok().flatten().map(Value::from)
        } else if *ty == Type::TIMESTAMPTZ {
            row.try_get::<_, Option<DateTime<Utc>>>(i)
                .ok()
                .flatten()
                .map(|ts| Value::String(ts.to_rfc3339()))
        } else {
            row.try_get::<_, Option<String>>(i).ok().flatten().map(Value::String)
        };
        map.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    map
}
