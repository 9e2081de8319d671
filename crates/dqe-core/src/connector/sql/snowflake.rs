//! Snowflake connector via the SQL API v2 (`/api/v2/statements`), a
//! submit-and-poll REST endpoint rather than a wire-protocol driver -- see
//! [`super::rest`] for the pieces shared with the other REST-family dialects.

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
pub struct SnowflakeConnectionSpec {
    pub account: String,
    pub token: String,
    pub warehouse: String,
    pub database: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl SnowflakeConnectionSpec {
    fn base_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com", self.account)
    }
}

pub struct SnowflakeConnector {
    spec: SnowflakeConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl SnowflakeConnector {
    pub fn new(spec: SnowflakeConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    /// Submit a statement to `/api/v2/statements` and poll the returned
    /// handle until the statement is no longer `running`.
    async fn execute(&self, sql: &str) -> Result<serde_json::Value> {
        let client = self.client().await?;
        let body = serde_json::json!({
            "statement": sql,
            "warehouse": self.spec.warehouse,
            "database": self.spec.database,
            "schema": self.spec.schema,
            "role": self.spec.role,
            "timeout": 60,
        });

        let mut resp: serde_json::Value = client
            .post(format!("{}/api/v2/statements", self.spec.base_url()))
            .header("Authorization", bearer(&self.spec.token))
            .header("X-Snowflake-Authorization-Token-Type", "OAUTH")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let handle = resp.get("statementHandle").and_then(|h| h.as_str()).map(str::to_owned);
        while resp.get("message").and_then(|m| m.as_str()) == Some("Statement executing.") {
            if let Some(handle) = &handle {
                tokio::time::sleep(Duration::from_millis(250)).await;
                resp = client
                    .get(format!("{}/api/v2/statements/{handle}", self.spec.base_url()))
                    .header("Authorization", bearer(&self.spec.token))
                    .send()
                    .await
                    .map_err(|e| Error::ConnectionFailed(e.to_string()))?
                    .json()
                    .await
                    .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            } else {
                break;
            }
        }
        Ok(resp)
    }

    fn rows_from_response(resp: &serde_json::Value) -> Result<QueryResult> {
        let columns: Vec<String> = resp
            .pointer("/resultSetMetaData/rowType")
            .and_then(|v| v.as_array())
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("name").and_then(|n| n.as_str()).map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();

        let data = resp.get("data").and_then(|d| d.as_array()).cloned().unwrap_or_default();
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
impl Connector for SnowflakeConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Snowflake
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
                "Snowflake SQL API connector does not bind positional params; pass fully-formed SQL".to_owned(),
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
                schema: result.get(row, "schema_name").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "name").map(Value::as_display).unwrap_or_default(),
                kind: TableKind::Table,
                row_count: result.get(row, "rows").and_then(Value::as_f64).map(|n| n as i64),
                size_bytes: result.get(row, "bytes").and_then(Value::as_f64).map(|n| n as i64),
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_ident(table)?;
        let result = self.query(&format!("DESCRIBE TABLE {table}"), &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| {
                let nullable = result.get(row, "null?").map(Value::as_display).as_deref() == Some("Y");
                ColumnInfo {
                    name: result.get(row, "name").map(Value::as_display).unwrap_or_default(),
                    data_type: result.get(row, "type").map(Value::as_display).unwrap_or_default(),
                    nullable,
                    default: result.get(row, "default").map(Value::as_display).filter(|s| !s.is_empty()),
                    primary_key: result.get(row, "primary key").map(Value::as_display).as_deref() == Some("Y"),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_account_identifier() {
        let spec = SnowflakeConnectionSpec {
            account: "xy12345".to_owned(),
            token: "t".to_owned(),
            warehouse: "wh".to_owned(),
            database: "db".to_owned(),
            schema: None,
            role: None,
        };
        assert_eq!(spec.base_url(), "https://xy12345.snowflakecomputing.com");
    }

    #[test]
    fn rows_from_response_parses_columns_and_data() {
        let resp = serde_json::json!({
            "resultSetMetaData": {"rowType": [{"name": "id"}, {"name": "n"}]},
            "data": [["1", 2], ["3", 4]],
        });
        let result = SnowflakeConnector::rows_from_response(&resp).unwrap();
        assert_eq!(result.columns, vec!["id", "n"]);
        assert_eq!(result.row_count, 2);
    }
}
