//! ClickHouse connector via the official `clickhouse` crate.
//!
//! The crate's typed `Row` API expects a compile-time struct per query, which
//! does not fit a generic ad hoc executor. Instead this connector asks
//! ClickHouse for `JSONEachRow` output via `fetch_bytes` and parses each line
//! itself, the same materialize-into-generic-maps approach used by the other
//! SQL connectors.

use async_trait::async_trait;
use clickhouse::Client;
use dqe_db::models::DatasourceType;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ClickhouseConnectionSpec {
    pub url: String,
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub struct ClickhouseConnector {
    spec: ClickhouseConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl ClickhouseConnector {
    pub fn new(spec: ClickhouseConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    fn build_client(&self) -> Client {
        let mut client = Client::default().with_url(&self.spec.url).with_database(&self.spec.database);
        if let Some(user) = &self.spec.user {
            client = client.with_user(user);
        }
        if let Some(password) = &self.spec.password {
            client = client.with_password(password);
        }
        client
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }
}

fn json_value_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

#[async_trait]
impl Connector for ClickhouseConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Clickhouse
    }

    async fn connect(&self) -> Result<()> {
        *self.client.write().await = Some(self.build_client());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.query("SELECT 1", &[]).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if !params.is_empty() {
            return Err(Error::Unsupported(
                "ClickHouse connector does not bind positional params on this path; use literal SQL from the view compiler".to_owned(),
            ));
        }

        let client = self.client().await?;
        let sql_with_format = format!("{sql} FORMAT JSONEachRow");
        let bytes = client
            .query(&sql_with_format)
            .fetch_bytes("JSONEachRow")
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .collect()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let text = String::from_utf8_lossy(&bytes);
        let mut columns: Vec<String> = Vec::new();
        let mut materialized = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let parsed: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(line).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            if columns.is_empty() {
                columns = parsed.keys().cloned().collect();
            }
            let values = columns.iter().map(|c| parsed.get(c).map(json_value_to_value).unwrap_or(Value::Null)).collect();
            materialized.push(values);
        }

        Ok(QueryResult {
            row_count: materialized.len(),
            rows: materialized,
            columns,
        })
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let result = self.query("SELECT database, name, engine FROM system.tables", &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: result.get(row, "database").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "name").map(Value::as_display).unwrap_or_default(),
                kind: match result.get(row, "engine").map(Value::as_display).as_deref() {
                    Some(engine) if engine.contains("View") => TableKind::View,
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
            "SELECT name, type, default_expression FROM system.columns WHERE table = '{table}' ORDER BY position"
        );
        let result = self.query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| {
                let data_type = result.get(row, "type").map(Value::as_display).unwrap_or_default();
                ColumnInfo {
                    name: result.get(row, "name").map(Value::as_display).unwrap_or_default(),
                    nullable: data_type.starts_with("Nullable("),
                    data_type,
                    default: result.get(row, "default_expression").map(Value::as_display).filter(|s| !s.is_empty()),
                    primary_key: false,
                }
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
