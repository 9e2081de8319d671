//! DuckDB connector. `duckdb` is a synchronous, embedded driver (no network
//! round-trip), so calls are still routed through `spawn_blocking` to avoid
//! blocking the async runtime on large analytical scans.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use serde::Deserialize;

use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

/// `path` is either a file path or `:memory:`.
#[derive(Debug, Clone, Deserialize)]
pub struct DuckdbConnectionSpec {
    pub path: String,
}

pub struct DuckdbConnector {
    spec: DuckdbConnectionSpec,
    conn: Arc<Mutex<Option<duckdb::Connection>>>,
}

impl DuckdbConnector {
    pub fn new(spec: DuckdbConnectionSpec) -> Self {
        Self {
            spec,
            conn: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl Connector for DuckdbConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Duckdb
    }

    async fn connect(&self) -> Result<()> {
        let path = self.spec.path.clone();
        let conn = tokio::task::spawn_blocking(move || duckdb::Connection::open(&path))
            .await
            .map_err(|e| Error::Other(e.into()))?
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        *self.conn.lock().expect("duckdb connection mutex poisoned") = Some(conn);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.query("SELECT 1", &[]).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        *self.conn.lock().expect("duckdb connection mutex poisoned") = None;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if !params.is_empty() {
            return Err(Error::Unsupported(
                "DuckDB connector does not bind positional params on this path; use literal SQL from the view compiler".to_owned(),
            ));
        }

        let sql = sql.to_owned();
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("duckdb connection mutex poisoned");
            let conn = guard.as_ref().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))?;

            let mut stmt = conn.prepare(&sql).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            let columns: Vec<String> = stmt.column_names();

            let mut rows = stmt.query([]).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            let mut materialized = Vec::new();
            while let Some(row) = rows.next().map_err(|e| Error::ConnectionFailed(e.to_string()))? {
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
        let result = self
            .query(
                "SELECT table_schema, table_name, table_type FROM information_schema.tables",
                &[],
            )
            .await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: result.get(row, "table_schema").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "table_name").map(Value::as_display).unwrap_or_default(),
                kind: match result.get(row, "table_type").map(Value::as_display).as_deref() {
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
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns WHERE table_name = '{table}' \
             ORDER BY ordinal_position"
        );
        let result = self.query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: result.get(row, "column_name").map(Value::as_display).unwrap_or_default(),
                data_type: result.get(row, "data_type").map(Value::as_display).unwrap_or_default(),
                nullable: result.get(row, "is_nullable").map(Value::as_display).as_deref() == Some("YES"),
                default: result.get(row, "column_default").map(Value::as_display),
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_table_ident(table)?;
        let result = self.query(&format!("SELECT COUNT(*) AS cnt FROM {table}"), &[]).await?;
        let count = result.rows.first().and_then(|row| result.get(row, "cnt")).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(count as i64)
    }
}
