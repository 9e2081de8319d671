//! SQL Server connector via `tiberius`, the pure-Rust TDS client.
//!
//! Unlike the `sqlx`-backed connectors, `tiberius` speaks directly over a
//! `tokio::net::TcpStream` wrapped in a `tokio-util` compat adapter rather
//! than through `sqlx`'s pool abstraction, so connections here are held one
//! at a time behind an async mutex instead of a pool.

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use serde::Deserialize;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::TokioAsyncWriteCompatExt;

use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct MssqlConnectionSpec {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

fn default_port() -> u16 {
    1433
}

type TdsClient = Client<tokio_util::compat::Compat<TcpStream>>;

pub struct MssqlConnector {
    spec: MssqlConnectionSpec,
    client: Mutex<Option<TdsClient>>,
}

impl MssqlConnector {
    pub fn new(spec: MssqlConnectionSpec) -> Self {
        Self {
            spec,
            client: Mutex::new(None),
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.spec.host);
        config.port(self.spec.port);
        config.database(&self.spec.database);
        config.authentication(AuthMethod::sql_server(&self.spec.user, &self.spec.password));
        config.trust_cert();
        config
    }
}

#[async_trait]
impl Connector for MssqlConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::SqlServer
    }

    async fn connect(&self) -> Result<()> {
        let config = self.config();
        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        tcp.set_nodelay(true).map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        *self.client.lock().await = Some(client);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .into_first_result()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.client.lock().await = None;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if !params.is_empty() {
            return Err(Error::Unsupported(
                "SQL Server connector requires literal-free queries; bind via the view compiler instead".to_owned(),
            ));
        }

        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))?;

        let stream = client.simple_query(sql).await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let rows = stream.into_first_result().await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_owned()).collect())
            .unwrap_or_default();

        let materialized = rows
            .iter()
            .map(|row| {
                (0..columns.len())
                    .map(|idx| {
                        row.try_get::<&str, _>(idx)
                            .ok()
                            .flatten()
                            .map(|s| Value::Text(s.to_owned()))
                            .or_else(|| row.try_get::<i32, _>(idx).ok().flatten().map(|i| Value::Int(i as i64)))
                            .or_else(|| row.try_get::<i64, _>(idx).ok().flatten().map(Value::Int))
                            .or_else(|| row.try_get::<f64, _>(idx).ok().flatten().map(Value::Float))
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect::<Vec<_>>();

        Ok(QueryResult {
            row_count: materialized.len(),
            rows: materialized,
            columns,
        })
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let result = self
            .query(
                "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES",
                &[],
            )
            .await?;

        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: result.get(row, "TABLE_SCHEMA").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "TABLE_NAME").map(Value::as_display).unwrap_or_default(),
                kind: match result.get(row, "TABLE_TYPE").map(Value::as_display).as_deref() {
                    Some("VIEW") => TableKind::View,
                    _ => TableKind::Table,
                },
                row_count: None,
                size_bytes: None,
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_ident(table)?;
        let sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE, COLUMN_DEFAULT \
             FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = '{table}' \
             ORDER BY ORDINAL_POSITION"
        );
        let result = self.query(&sql, &[]).await?;

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: result.get(row, "COLUMN_NAME").map(Value::as_display).unwrap_or_default(),
                data_type: result.get(row, "DATA_TYPE").map(Value::as_display).unwrap_or_default(),
                nullable: result.get(row, "IS_NULLABLE").map(Value::as_display).as_deref() == Some("YES"),
                default: result.get(row, "COLUMN_DEFAULT").map(Value::as_display),
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_table_ident(table)?;
        let result = self.query(&format!("SELECT COUNT(*) AS cnt FROM {table}"), &[]).await?;
        let count = result
            .rows
            .first()
            .and_then(|row| result.get(row, "cnt"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        Ok(count as i64)
    }
}
