//! HDFS connector. A "table" under this dialect is a directory of part
//! files; metadata comes from listing the directory rather than a catalog
//! (HDFS has none), but the capability set and `Unsupported` `query` are
//! identical to the other lakehouse dialects.

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use hdfs_native::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::lakehouse::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct HdfsConnectionSpec {
    /// `hdfs://namenode:port`
    pub namenode_uri: String,
    /// Directory whose immediate children are treated as tables.
    pub root_path: String,
}

pub struct HdfsConnector {
    spec: HdfsConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl HdfsConnector {
    pub fn new(spec: HdfsConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }
}

#[async_trait]
impl Connector for HdfsConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Hdfs
    }

    async fn connect(&self) -> Result<()> {
        let client = Client::new(&self.spec.namenode_uri).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client.get_file_info(&self.spec.root_path).await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("HDFS")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let client = self.client().await?;
        let entries = client
            .list_status(&self.spec.root_path, false)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.isdir)
            .map(|entry| TableInfo {
                schema: self.spec.root_path.clone(),
                name: entry.path.rsplit('/').next().unwrap_or(&entry.path).to_owned(),
                kind: TableKind::ExternalFile,
                row_count: None,
                size_bytes: Some(entry.length as i64),
            })
            .collect())
    }

    async fn list_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        // HDFS has no catalog -- schema inference requires reading a part
        // file's own format header, which the object-storage connectors do
        // for S3/GCS/Azure/local. A physical directory of files carries no
        // declared schema on its own.
        Ok(vec![])
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let client = self.client().await?;
        let dir = format!("{}/{}", self.spec.root_path.trim_end_matches('/'), table);
        let entries = client.list_status(&dir, true).await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(entries.iter().filter(|e| !e.isdir).count() as i64)
    }
}
