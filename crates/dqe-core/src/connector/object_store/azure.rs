//! Azure Blob connector. Same prefix-as-table model as [`super::s3`].

use async_trait::async_trait;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};
use dqe_db::models::DatasourceType;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::object_store::format::{infer, FileFormat};
use crate::connector::object_store::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct AzureBlobConnectionSpec {
    pub account: String,
    pub access_key: String,
    pub container: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

pub struct AzureBlobConnector {
    spec: AzureBlobConnectionSpec,
    client: RwLock<Option<BlobServiceClient>>,
}

impl AzureBlobConnector {
    pub fn new(spec: AzureBlobConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<BlobServiceClient> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    fn root_prefix(&self) -> String {
        self.spec.prefix.clone().unwrap_or_default()
    }

    async fn sample_object(&self, table: &str) -> Result<(String, Vec<u8>)> {
        let service = self.client().await?;
        let container = service.container_client(&self.spec.container);
        let prefix = format!("{}{}/", self.root_prefix(), table);

        let mut pages = container.list_blobs().prefix(prefix.clone()).max_results(1u32.try_into().unwrap()).into_stream();
        let key = pages
            .next()
            .await
            .transpose()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .and_then(|page| page.blobs.blobs().next().map(|b| b.name.clone()))
            .ok_or_else(|| Error::NotFound(format!("no blobs under prefix {prefix:?}")))?;

        let bytes = container
            .blob_client(&key)
            .get_content()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok((key, bytes))
    }
}

#[async_trait]
impl Connector for AzureBlobConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::AzureBlob
    }

    async fn connect(&self) -> Result<()> {
        let credentials = StorageCredentials::access_key(self.spec.account.clone(), self.spec.access_key.clone());
        let client = ClientBuilder::new(self.spec.account.clone(), credentials).blob_service_client();
        *self.client.write().await = Some(client);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let service = self.client().await?;
        let container = service.container_client(&self.spec.container);
        container.get_properties().await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("Azure Blob")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let service = self.client().await?;
        let container = service.container_client(&self.spec.container);
        let mut pages = container.list_blobs().prefix(self.root_prefix()).delimiter("/").into_stream();

        let mut tables = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
            for prefix in page.blobs.prefixes() {
                tables.push(TableInfo {
                    schema: self.spec.container.clone(),
                    name: prefix.name.trim_end_matches('/').rsplit('/').next().unwrap_or(&prefix.name).to_owned(),
                    kind: TableKind::ExternalFile,
                    row_count: None,
                    size_bytes: None,
                });
            }
        }
        Ok(tables)
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (key, bytes) = self.sample_object(table).await?;
        let format = FileFormat::from_key(&key)
            .ok_or_else(|| Error::Unsupported(format!("unrecognized file format for key {key:?}")))?;
        Ok(infer(format, &bytes)?.columns)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let (key, bytes) = self.sample_object(table).await?;
        let format = FileFormat::from_key(&key)
            .ok_or_else(|| Error::Unsupported(format!("unrecognized file format for key {key:?}")))?;
        Ok(infer(format, &bytes)?.row_count)
    }
}
