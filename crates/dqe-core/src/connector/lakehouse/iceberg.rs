//! Iceberg connector via a REST catalog. Metadata comes from the table's
//! current schema and manifest list; `query` is unsupported.

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use iceberg::{Catalog, TableIdent};
use iceberg_catalog_rest::{RestCatalog, RestCatalogConfig};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::lakehouse::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct IcebergConnectionSpec {
    pub catalog_uri: String,
    pub warehouse: String,
    pub namespace: String,
    pub table: String,
}

pub struct IcebergConnector {
    spec: IcebergConnectionSpec,
    catalog: RwLock<Option<RestCatalog>>,
}

impl IcebergConnector {
    pub fn new(spec: IcebergConnectionSpec) -> Self {
        Self {
            spec,
            catalog: RwLock::new(None),
        }
    }

    fn table_ident(&self) -> TableIdent {
        TableIdent::from_strs([self.spec.namespace.as_str(), self.spec.table.as_str()])
            .expect("namespace/table configured on datasource creation are non-empty")
    }

    async fn load_table(&self) -> Result<iceberg::table::Table> {
        let guard = self.catalog.read().await;
        let catalog = guard.as_ref().ok_or_else(|| Error::ConnectionFailed("connector not connected".to_owned()))?;
        catalog
            .load_table(&self.table_ident())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl Connector for IcebergConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::Iceberg
    }

    async fn connect(&self) -> Result<()> {
        let config = RestCatalogConfig::builder()
            .uri(self.spec.catalog_uri.clone())
            .warehouse(self.spec.warehouse.clone())
            .build();
        *self.catalog.write().await = Some(RestCatalog::new(config));
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.load_table().await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        *self.catalog.write().await = None;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("Iceberg")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let table = self.load_table().await?;
        Ok(vec![TableInfo {
            schema: self.spec.namespace.clone(),
            name: self.spec.table.clone(),
            kind: TableKind::ExternalFile,
            row_count: None,
            size_bytes: table.metadata().current_snapshot().map(|s| s.summary().additional_properties.len() as i64),
        }])
    }

    async fn list_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        let table = self.load_table().await?;
        let schema = table.metadata().current_schema();
        Ok(schema
            .as_struct()
            .fields()
            .iter()
            .map(|f| ColumnInfo {
                name: f.name.clone(),
                data_type: format!("{:?}", f.field_type),
                nullable: !f.required,
                default: None,
                primary_key: false,
            })
            .collect())
    }

    async fn row_count(&self, _table: &str) -> Result<i64> {
        let table = self.load_table().await?;
        let count = table
            .metadata()
            .current_snapshot()
            .and_then(|s| s.summary().additional_properties.get("total-records"))
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        Ok(count)
    }
}
