//! S3 connector. "Tables" are top-level prefixes under `bucket`; schema and
//! row count are inferred from the first object under each prefix.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use dqe_db::models::DatasourceType;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::object_store::format::{infer, FileFormat};
use crate::connector::object_store::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct S3ConnectionSpec {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

pub struct S3Connector {
    spec: S3ConnectionSpec,
    client: RwLock<Option<Client>>,
}

impl S3Connector {
    pub fn new(spec: S3ConnectionSpec) -> Self {
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

    /// First object under `table` (a sub-prefix of the root), used as the
    /// representative sample for format inference.
    async fn sample_object(&self, table: &str) -> Result<(String, Vec<u8>)> {
        let client = self.client().await?;
        let prefix = format!("{}{}/", self.root_prefix(), table);
        let listing = client
            .list_objects_v2()
            .bucket(&self.spec.bucket)
            .prefix(&prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let key = listing
            .contents()
            .first()
            .and_then(|o| o.key())
            .ok_or_else(|| Error::NotFound(format!("no objects under prefix {prefix:?}")))?
            .to_owned();
        let object = client
            .get_object()
            .bucket(&self.spec.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let bytes = object.body.collect().await.map_err(|e| Error::ConnectionFailed(e.to_string()))?.to_vec();
        Ok((key, bytes))
    }
}

#[async_trait]
impl Connector for S3Connector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::S3
    }

    async fn connect(&self) -> Result<()> {
        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest()).region(aws_sdk_s3::config::Region::new(self.spec.region.clone()));
        if let Some(endpoint) = &self.spec.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let config = loader.load().await;
        *self.client.write().await = Some(Client::new(&config));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .head_bucket()
            .bucket(&self.spec.bucket)
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.client.write().await = None;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("S3")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let client = self.client().await?;
        let listing = client
            .list_objects_v2()
            .bucket(&self.spec.bucket)
            .prefix(self.root_prefix())
            .delimiter("/")
            .send()
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        Ok(listing
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .map(|prefix| TableInfo {
                schema: self.spec.bucket.clone(),
                name: prefix.trim_end_matches('/').rsplit('/').next().unwrap_or(prefix).to_owned(),
                kind: TableKind::ExternalFile,
                row_count: None,
                size_bytes: None,
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let (key, bytes) = self.sample_object(table).await?;
        let format = FileFormat::from_key(&key).ok_or_else(|| Error::Unsupported(format!("unrecognized file format for key {key:?}")))?;
        Ok(infer(format, &bytes)?.columns)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        let (key, bytes) = self.sample_object(table).await?;
        let format = FileFormat::from_key(&key).ok_or_else(|| Error::Unsupported(format!("unrecognized file format for key {key:?}")))?;
        Ok(infer(format, &bytes)?.row_count)
    }
}
