//! Trino connector via the coordinator's statement protocol
//! (`POST /v1/statement`, then following `nextUri` until the result set is
//! fully drained). Metadata queries use `SHOW TABLES` / `DESCRIBE TABLE`
//! like Snowflake and Databricks.

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::sql::rest::{build_client, json_to_value};
use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct TrinoConnectionSpec {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub catalog: String,
    #[serde(default)]
    pub schema: Option<String>,
}

fn default_port() -> u16 {
    8080
}

pub struct TrinoConnector {
    spec: TrinoConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl TrinoConnector {
    pub fn new(spec: TrinoConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let client = self.client().await?;
        let mut resp: serde_json::Value = client
            .post(format!("http://{}:{}/v1/statement", self.spec.host, self.spec.port))
            .header("X-Trino-User", &self.spec.user)
            .header("X-Trino-Catalog", &self.spec.catalog)
            .header("X-Trino-Schema", self.spec.schema.as_deref().unwrap_or("default"))
            .body(sql.to_owned())
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Vec<Value>> = Vec::new();

        loop {
            if let Some(error) = resp.get("error") {
                return Err(Error::ConnectionFailed(error.to_string()));
            }
            if columns.is_empty() {
                if let Some(fields) = resp.get("columns").and_then(|c| c.as_array()) {
                    columns = fields.iter().filter_map(|f| f.get("name").and_then(|n| n.as_str()).map(str::to_owned)).collect();
                }
            }
            if let Some(data) = resp.get("data").and_then(|d| d.as_array()) {
                for row in data {
                    let values = row.as_array().cloned().unwrap_or_default();
                    let materialized = (0..columns.len()).map(|idx| values.get(idx).map(json_to_value).unwrap_or(Value::Null)).collect();
                    rows.push(materialized);
                }
            }

            let next = resp.get("nextUri").and_then(|u| u.as_str()).map(str::to_owned);
            match next {
                Some(uri) => {
                    resp = client
                        .get(&uri)
                        .send()
                        .await
                        .map_err(|e| Error::ConnectionFailed(e.to_string()))?
                        .json()
                        .await
                        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
                }
                None => break,
            }
        }

        Ok(QueryResult {
            row_count: rows.len(),
            rows,
            columns,
        })
    }
}

#[async_trait]
impl Connector for TrinoConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Trino
    }

    async fn connect(&self) -> Result<()> {
        *self.client.write().await = Some(build_client()?);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.execute("SELECT 1").await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if !params.is_empty() {
            return Err(Error::Unsupported(
                "Trino statement protocol connector does not bind positional params; pass fully-formed SQL".to_owned(),
            ));
        }
        self.execute(sql).await
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let result = self.execute("SHOW TABLES").await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: self.spec.schema.clone().unwrap_or_else(|| "default".to_owned()),
                name: row.first().map(Value::as_display).unwrap_or_default(),
                kind: TableKind::Table,
                row_count: None,
                size_bytes: None,
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_ident(table)?;
        let result = self.execute(&format!("DESCRIBE {table}")).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: result.get(row, "Column").map(Value::as_display).unwrap_or_default(),
                data_type: result.get(row, "Type").map(Value::as_display).unwrap_or_default(),
                nullable: true,
                default: None,
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_table_ident(table)?;
        let result = self.execute(&format!("SELECT COUNT(*) AS cnt FROM {table}")).await?;
        let count = result.rows.first().and_then(|row| result.get(row, "cnt")).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_8080() {
        assert_eq!(default_port(), 8080);
    }
}
