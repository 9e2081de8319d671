//! Databricks connector via the SQL Statement Execution API
//! (`/api/2.0/sql/statements`) against a SQL warehouse.

use std::time::Duration;

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::sql::rest::{bearer, build_client, json_to_value};
use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct DatabricksConnectionSpec {
    /// Workspace hostname, e.g. `dbc-abcd1234-5678.cloud.databricks.com`.
    pub host: String,
    pub token: String,
    pub warehouse_id: String,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

pub struct DatabricksConnector {
    spec: DatabricksConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl DatabricksConnector {
    pub fn new(spec: DatabricksConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    async fn execute(&self, sql: &str) -> Result<serde_json::Value> {
        let client = self.client().await?;
        let body = serde_json::json!({
            "statement": sql,
            "warehouse_id": self.spec.warehouse_id,
            "catalog": self.spec.catalog,
            "schema": self.spec.schema,
            "wait_timeout": "30s",
        });

        let mut resp: serde_json::Value = client
            .post(format!("https://{}/api/2.0/sql/statements", self.spec.host))
            .header("Authorization", bearer(&self.spec.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let statement_id = resp.get("statement_id").and_then(|v| v.as_str()).map(str::to_owned);
        loop {
            let state = resp.pointer("/status/state").and_then(|s| s.as_str()).unwrap_or("");
            match state {
                "PENDING" | "RUNNING" => {
                    let Some(id) = &statement_id else { break };
                    tokio::time::sleep(Duration::from_millis(250)).await;
                    resp = client
                        .get(format!("https://{}/api/2.0/sql/statements/{id}", self.spec.host))
                        .header("Authorization", bearer(&self.spec.token))
                        .send()
                        .await
                        .map_err(|e| Error::ConnectionFailed(e.to_string()))?
                        .json()
                        .await
                        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
                }
                "FAILED" | "CANCELED" => {
                    let message = resp.pointer("/status/error/message").and_then(|m| m.as_str()).unwrap_or(state);
                    return Err(Error::ConnectionFailed(message.to_owned()));
                }
                _ => break,
            }
        }
        Ok(resp)
    }

    fn rows_from_response(resp: &serde_json::Value) -> Result<QueryResult> {
        let columns: Vec<String> = resp
            .pointer("/manifest/schema/columns")
            .and_then(|v| v.as_array())
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("name").and_then(|n| n.as_str()).map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();

        let data = resp
            .pointer("/result/data_array")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        let rows = data
            .into_iter()
            .map(|row| {
                let values = row.as_array().cloned().unwrap_or_default();
                (0..columns.len()).map(|idx| values.get(idx).map(json_to_value).unwrap_or(Value::Null)).collect()
            })
            .collect::<Vec<_>>();

        Ok(QueryResult {
            row_count: rows.len(),
            rows,
            columns,
        })
    }
}

#[async_trait]
impl Connector for DatabricksConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Databricks
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
                "Databricks statement API connector does not bind positional params; pass fully-formed SQL".to_owned(),
            ));
        }
        let resp = self.execute(sql).await?;
        Self::rows_from_response(&resp)
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let result = self.query("SHOW TABLES", &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: result.get(row, "database").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "tableName").map(Value::as_display).unwrap_or_default(),
                kind: if result.get(row, "isTemporary").map(Value::as_display).as_deref() == Some("true") {
                    TableKind::View
                } else {
                    TableKind::Table
                },
                row_count: None,
                size_bytes: None,
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_ident(table)?;
        let result = self.query(&format!("DESCRIBE TABLE {table}"), &[]).await?;
        Ok(result
            .rows
            .iter()
            .filter(|row| result.get(row, "col_name").map(Value::as_display).is_some_and(|n| !n.starts_with('#')))
            .map(|row| ColumnInfo {
                name: result.get(row, "col_name").map(Value::as_display).unwrap_or_default(),
                data_type: result.get(row, "data_type").map(Value::as_display).unwrap_or_default(),
                nullable: true,
                default: None,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_from_response_parses_manifest_and_data_array() {
        let resp = serde_json::json!({
            "manifest": {"schema": {"columns": [{"name": "id"}, {"name": "n"}]}},
            "result": {"data_array": [["1", "2"]]},
        });
        let result = DatabricksConnector::rows_from_response(&resp).unwrap();
        assert_eq!(result.columns, vec!["id", "n"]);
        assert_eq!(result.row_count, 1);
    }
}
