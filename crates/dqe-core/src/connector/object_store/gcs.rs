//! GCS connector. Same prefix-as-table model as [`super::s3`].

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::object_store::format::{infer, FileFormat};
use crate::connector::object_store::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct GcsConnectionSpec {
    pub bucket: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

pub struct GcsConnector {
    spec: GcsConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl GcsConnector {
    pub fn new(spec: GcsConnectionSpec) -> Self {
        Self {
            spec,
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client.read().await.clone().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))
    }

    fn root_prefix(&self) -> String {
        self.spec.prefix.clone().unwrap_or_default()
    }

    async fn sample_object(&self, table: &str) -> Result<(String, Vec<u8>)> {
        let client = self.client().await?;
        let prefix = format!("{}{}/", self.root_prefix(), table);
        let listing = client
            .list_objects(&ListObjectsRequest {
                bucket: self.spec.bucket.clone(),
                prefix: Some(prefix.clone()),
                max_results: Some(1),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let key = listing
            .items
            .unwrap_or_default()
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| Error::NotFound(format!("no objects under prefix {prefix:?}")))?;
        let bytes = client
            .download_object(
                &GetObjectRequest {
                    bucket: self.spec.bucket.clone(),
                    object: key.clone(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok((key, bytes))
    }
}

#[async_trait]
impl Connector for GcsConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Gcs
    }

    async fn connect(&self) -> Result<()> {
        let config = ClientConfig::default().with_auth().await.map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        *self.client.write().await = Some(Client::new(config));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .list_objects(&ListObjectsRequest {
                bucket: self.spec.bucket.clone(),
                max_results: Some(1),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("GCS")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let client = self.client().await?;
        let listing = client
            .list_objects(&ListObjectsRequest {
                bucket: self.spec.bucket.clone(),
                prefix: Some(self.root_prefix()),
                delimiter: Some("/".to_owned()),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        Ok(listing
            .prefixes
            .unwrap_or_default()
            .into_iter()
            .map(|prefix| TableInfo {
                schema: self.spec.bucket.clone(),
                name: prefix.trim_end_matches('/').rsplit('/').next().unwrap_or(&prefix).to_owned(),
                kind: TableKind::ExternalFile,
                row_count: None,
                size_bytes: None,
            })
            .collect())
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
