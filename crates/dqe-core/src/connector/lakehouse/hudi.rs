//! Hudi connector. There is no mature native-Rust Hudi client in the
//! workspace dependency set, so this connector reads a Hudi copy-on-write
//! table as a plain Parquet dataset via `datafusion`, skipping the
//! `.hoodie` metadata directory. This does not honor merge-on-read logs or
//! incremental queries -- documented as an open decision in `DESIGN.md`.

use std::sync::Arc;

use async_trait::async_trait;
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use dqe_db::models::DatasourceType;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::lakehouse::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct HudiConnectionSpec {
    /// Base path of the Hudi table (local path or object-store URI
    /// understood by `datafusion`'s registered object stores).
    pub base_path: String,
}

pub struct HudiConnector {
    spec: HudiConnectionSpec,
    ctx: RwLock<Option<Arc<SessionContext>>>,
}

impl HudiConnector {
    pub fn new(spec: HudiConnectionSpec) -> Self {
        Self {
            spec,
            ctx: RwLock::new(None),
        }
    }

    async fn ctx(&self) -> Result<Arc<SessionContext>> {
        self.ctx.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    async fn register(&self, ctx: &SessionContext) -> Result<()> {
        let glob = format!("{}/*.parquet", self.spec.base_path.trim_end_matches('/'));
        ctx.register_parquet("hudi_table", &glob, ParquetReadOptions::default())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl Connector for HudiConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Hudi
    }

    async fn connect(&self) -> Result<()> {
        let ctx = Arc::new(SessionContext::new());
        self.register(&ctx).await?;
        *self.ctx.write().await = Some(ctx);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let ctx = self.ctx().await?;
        ctx.table("hudi_table").await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.ctx.write().await = None;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("Hudi")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        Ok(vec![TableInfo {
            schema: String::new(),
            name: self.spec.base_path.clone(),
            kind: TableKind::ExternalFile,
            row_count: None,
            size_bytes: None,
        }])
    }

    async fn list_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        let ctx = self.ctx().await?;
        let df = ctx.table("hudi_table").await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(df
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnInfo {
                name: f.name().clone(),
                data_type: format!("{:?}", f.data_type()),
                nullable: f.is_nullable(),
                default: None,
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, _table: &str) -> Result<i64> {
        let ctx = self.ctx().await?;
        let df = ctx
            .sql("SELECT COUNT(*) AS cnt FROM hudi_table")
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let batches = df.collect().await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let count = batches
            .first()
            .and_then(|b| b.column(0).as_any().downcast_ref::<datafusion::arrow::array::Int64Array>().map(|a| a.value(0)))
            .unwrap_or(0);
        Ok(count)
    }
}
