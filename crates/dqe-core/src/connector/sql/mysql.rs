//! MySQL connector, sharing the `sqlx` driver stack with [`super::postgres`].

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use serde::Deserialize;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Column, MySql, MySqlPool, Row};
use tokio::sync::RwLock;

use crate::connector::sql::validate_table_ident;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct MysqlConnectionSpec {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

fn default_port() -> u16 {
    3306
}

impl MysqlConnectionSpec {
    pub fn to_url(&self) -> String {
        format!("mysql://{}:{}@{}:{}/{}", self.user, self.password, self.host, self.port, self.database)
    }
}

pub struct MysqlConnector {
    spec: MysqlConnectionSpec,
    pool: RwLock<Option<MySqlPool>>,
}

impl MysqlConnector {
    pub fn new(spec: MysqlConnectionSpec) -> Self {
        Self {
            spec,
            pool: RwLock::new(None),
        }
    }

    async fn pool(&self) -> Result<MySqlPool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }
}

fn row_to_value(row: &sqlx::mysql::MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::Int).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::Float).unwrap_or(Value::Null);
    }
    row.try_get::<Option<String>, _>(idx)
        .ok()
        .flatten()
        .map(Value::Text)
        .unwrap_or(Value::Null)
}

#[async_trait]
impl Connector for MysqlConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Mysql
    }

    async fn connect(&self) -> Result<()> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&self.spec.to_url())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        *self.pool.write().await = Some(pool);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let pool = self.pool().await?;
        let mut query = sqlx::query::<MySql>(sql);
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Int(i) => query.bind(*i),
                Value::Float(f) => query.bind(*f),
                Value::Text(s) => query.bind(s.clone()),
                Value::Timestamp(t) => query.bind(*t),
            };
        }

        let rows = query.fetch_all(&pool).await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_owned()).collect())
            .unwrap_or_default();

        let materialized = rows
            .iter()
            .map(|row| (0..columns.len()).map(|idx| row_to_value(row, idx)).collect())
            .collect::<Vec<_>>();

        Ok(QueryResult {
            row_count: materialized.len(),
            rows: materialized,
            columns,
        })
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT table_schema, table_name, table_type FROM information_schema.tables \
             WHERE table_schema = DATABASE()",
        )
        .fetch_all(&pool)
        .await
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let schema: String = row.get("table_schema");
                let name: String = row.get("table_name");
                let table_type: String = row.get("table_type");
                TableInfo {
                    schema,
                    name,
                    kind: if table_type == "VIEW" { TableKind::View } else { TableKind::Table },
                    row_count: None,
                    size_bytes: None,
                }
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_ident(table)?;
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns \
             WHERE table_name = ? AND table_schema = DATABASE() \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&pool)
        .await
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let is_nullable: String = row.get("is_nullable");
                ColumnInfo {
                    name: row.get("column_name"),
                    data_type: row.get("data_type"),
                    nullable: is_nullable == "YES",
                    default: row.get("column_default"),
                    primary_key: false,
                }
            })
            .collect())
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        validate_table_ident(table)?;
        let pool = self.pool().await?;
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(row.0)
    }
}
