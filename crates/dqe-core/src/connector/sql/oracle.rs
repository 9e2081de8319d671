//! Oracle connector via the `oracle` crate's synchronous OCI binding.
//!
//! The driver has no async API, so every call is dispatched through
//! `spawn_blocking` onto the blocking thread pool, matching how the rest of
//! this crate treats synchronous drivers (see also [`super::duckdb`]).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use serde::Deserialize;

use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConnectionSpec {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub service_name: String,
    pub user: String,
    pub password: String,
}

fn default_port() -> u16 {
    1521
}

impl OracleConnectionSpec {
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }
}

pub struct OracleConnector {
    spec: OracleConnectionSpec,
    // `oracle::Connection` is `Send` but not `Sync` (ODPI-C limitation), so
    // the connector holds it behind an `Arc<Mutex<_>>` and clones the `Arc`
    // into each `spawn_blocking` closure rather than sharing `&self` across
    // threads directly.
    conn: Arc<Mutex<Option<oracle::Connection>>>,
}

impl OracleConnector {
    pub fn new(spec: OracleConnectionSpec) -> Self {
        Self {
            spec,
            conn: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl Connector for OracleConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Oracle
    }

    async fn connect(&self) -> Result<()> {
        let spec = self.spec.clone();
        let connection = tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(&spec.user, &spec.password, spec.connect_string())
        })
        .await
        .map_err(|e| Error::Other(e.into()))?
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        *self.conn.lock().expect("oracle connection mutex poisoned") = Some(connection);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.query("SELECT 1 FROM DUAL", &[]).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        *self.conn.lock().expect("oracle connection mutex poisoned") = None;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if !params.is_empty() {
            return Err(Error::Unsupported(
                "Oracle connector does not bind positional params on this path; use literal SQL from the view compiler".to_owned(),
            ));
        }

        let sql = sql.to_owned();
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("oracle connection mutex poisoned");
            let conn = guard.as_ref().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))?;

            let rows = conn.query(&sql, &[]).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            let columns: Vec<String> = rows.column_info().iter().map(|c| c.name().to_owned()).collect();

            let mut materialized = Vec::new();
            for row in rows {
                let row = row.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
                let values = (0..columns.len())
                    .map(|idx| {
                        row.get::<usize, Option<String>>(idx)
                            .ok()
                            .flatten()
                            .map(Value::Text)
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                materialized.push(values);
            }

            Ok(QueryResult {
                row_count: materialized.len(),
                rows: materialized,
                columns,
            })
        })
        .await
        .map_err(|e| Error::Other(e.into()))?
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let result = self.query("SELECT OWNER, TABLE_NAME FROM ALL_TABLES", &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: result.get(row, "OWNER").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "TABLE_NAME").map(Value::as_display).unwrap_or_default(),
                kind: TableKind::Table,
                row_count: None,
                size_bytes: None,
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_ident(table)?;
        let sql = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, NULLABLE, DATA_DEFAULT \
             FROM ALL_TAB_COLUMNS WHERE TABLE_NAME = '{}' \
             ORDER BY COLUMN_ID",
            table.to_uppercase()
        );
        let result = self.query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: result.get(row, "COLUMN_NAME").map(Value::as_display).unwrap_or_default(),
                data_type: result.get(row, "DATA_TYPE").map(Value::as_display).unwrap_or_default(),
                nullable: result.get(row, "NULLABLE").map(Value::as_display).as_deref() == Some("Y"),
                default: result.get(row, "DATA_DEFAULT").map(Value::as_display),
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_table_ident(table)?;
        let result = self.query(&format!("SELECT COUNT(*) AS CNT FROM {table}"), &[]).await?;
        let count = result.rows.first().and_then(|row| result.get(row, "CNT")).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(count as i64)
    }
}
