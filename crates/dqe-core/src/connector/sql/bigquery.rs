//! BigQuery connector via the `jobs.query` REST endpoint. Metadata queries
//! go through `information_schema.tables`/`.columns`, same catalog surface
//! as PostgreSQL/MySQL/DuckDB.

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
pub struct BigqueryConnectionSpec {
    pub project: String,
    pub token: String,
    #[serde(default)]
    pub dataset: Option<String>,
}

pub struct BigqueryConnector {
    spec: BigqueryConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl BigqueryConnector {
    pub fn new(spec: BigqueryConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    fn rows_from_response(resp: &serde_json::Value) -> Result<QueryResult> {
        let columns: Vec<String> = resp
            .pointer("/schema/fields")
            .and_then(|v| v.as_array())
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.get("name").and_then(|n| n.as_str()).map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();

        let data = resp.get("rows").and_then(|d| d.as_array()).cloned().unwrap_or_default();
        let rows = data
            .into_iter()
            .map(|row| {
                let values = row.get("f").and_then(|f| f.as_array()).cloned().unwrap_or_default();
                (0..columns.len())
                    .map(|idx| values.get(idx).and_then(|cell| cell.get("v")).map(json_to_value).unwrap_or(Value::Null))
                    .collect()
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
impl Connector for BigqueryConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Bigquery
    }

    async fn connect(&self) -> Result<()> {
        *self.client.write().await = Some(build_client()?);
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
                "BigQuery jobs.query connector does not bind positional params; pass fully-formed SQL".to_owned(),
            ));
        }
        let client = self.client().await?;
        let body = serde_json::json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": 30_000,
        });
        let resp: serde_json::Value = client
            .post(format!(
                "https://bigquery.googleapis.com/bigquery/v2/projects/{}/queries",
                self.spec.project
            ))
            .header("Authorization", bearer(&self.spec.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        if let Some(error) = resp.get("error") {
            return Err(Error::ConnectionFailed(error.to_string()));
        }
        Self::rows_from_response(&resp)
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let dataset = self.spec.dataset.as_deref().unwrap_or("*");
        let sql = format!("SELECT table_schema, table_name, table_type FROM `{dataset}`.INFORMATION_SCHEMA.TABLES");
        let result = self.query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| TableInfo {
                schema: result.get(row, "table_schema").map(Value::as_display).unwrap_or_default(),
                name: result.get(row, "table_name").map(Value::as_display).unwrap_or_default(),
                kind: if result.get(row, "table_type").map(Value::as_display).as_deref() == Some("VIEW") {
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
        let dataset = self.spec.dataset.as_deref().unwrap_or_default();
        let sql = format!(
            "SELECT column_name, data_type, is_nullable FROM `{dataset}`.INFORMATION_SCHEMA.COLUMNS \
             WHERE table_name = '{table}' ORDER BY ordinal_position"
        );
        let result = self.query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: result.get(row, "column_name").map(Value::as_display).unwrap_or_default(),
                data_type: result.get(row, "data_type").map(Value::as_display).unwrap_or_default(),
                nullable: result.get(row, "is_nullable").map(Value::as_display).as_deref() == Some("YES"),
                default: None,
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_table_ident(table)?;
        let result = self.query(&format!("SELECT COUNT(*) AS cnt FROM `{table}`"), &[]).await?;
        let count = result.rows.first().and_then(|row| result.get(row, "cnt")).and_then(Value::as_f64).unwrap_or(0.0);
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_from_response_parses_schema_and_f_arrays() {
        let resp = serde_json::json!({
            "schema": {"fields": [{"name": "id"}]},
            "rows": [{"f": [{"v": "7"}]}],
        });
        let result = BigqueryConnector::rows_from_response(&resp).unwrap();
        assert_eq!(result.columns, vec!["id"]);
        assert_eq!(result.row_count, 1);
    }
}
