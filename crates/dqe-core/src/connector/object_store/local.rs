//! Local filesystem connector. "Tables" are immediate subdirectories of
//! `root_path`; same per-format inference as the cloud object-storage
//! connectors, read directly off disk instead of over the network.

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::connector::object_store::format::{infer, FileFormat};
use crate::connector::object_store::unsupported_query;
use crate::connector::{ColumnInfo, Connector, QueryResult, TableInfo, TableKind, Value};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct LocalFilesystemConnectionSpec {
    pub root_path: String,
}

pub struct LocalFilesystemConnector {
    spec: LocalFilesystemConnectionSpec,
    ready: RwLock<bool>,
}

impl LocalFilesystemConnector {
    pub fn new(spec: LocalFilesystemConnectionSpec) -> Self {
        Self {
            spec,
            ready: RwLock::new(false),
        }
    }

    async fn require_ready(&self) -> Result<()> {
        if *self.ready.read().await {
            Ok(())
        } else {
            Err(Error::ConnectionFailed("connector not connected".to_owned()))
        }
    }

    fn sample_file(&self, table: &str) -> Result<(String, Vec<u8>)> {
        let dir = std::path::Path::new(&self.spec.root_path).join(table);
        let entry = std::fs::read_dir(&dir)
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?
            .filter_map(|e| e.ok())
            .find(|e| e.path().is_file())
            .ok_or_else(|| Error::NotFound(format!("no files under {}", dir.display())))?;
        let bytes = std::fs::read(entry.path()).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok((entry.file_name().to_string_lossy().into_owned(), bytes))
    }
}

#[async_trait]
impl Connector for LocalFilesystemConnector {
    fn kind(&self) -> DatasourceType {
        DatasourceType::LocalFilesystem
    }

    async fn connect(&self) -> Result<()> {
        if !std::path::Path::new(&self.spec.root_path).is_dir() {
            return Err(Error::ConnectionFailed(format!("{} is not a directory", self.spec.root_path)));
        }
        *self.ready.write().await = true;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.require_ready().await
    }

    async fn close(&self) -> Result<()> {
        *self.ready.write().await = false;
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        unsupported_query("local filesystem")
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        self.require_ready().await?;
        let entries = std::fs::read_dir(&self.spec.root_path).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| TableInfo {
                schema: self.spec.root_path.clone(),
                name: e.file_name().to_string_lossy().into_owned(),
                kind: TableKind::ExternalFile,
                row_count: None,
                size_bytes: None,
            })
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.require_ready().await?;
        let (name, bytes) = self.sample_file(table)?;
        let format = FileFormat::from_key(&name)
            .ok_or_else(|| Error::Unsupported(format!("unrecognized file format for {name:?}")))?;
        Ok(infer(format, &bytes)?.columns)
    }

    async fn row_count(&self, table: &str) -> Result<i64> {
        self.require_ready().await?;
        let (name, bytes) = self.sample_file(table)?;
        let format = FileFormat::from_key(&name)
            .ok_or_else(|| Error::Unsupported(format!("unrecognized file format for {name:?}")))?;
        Ok(infer(format, &bytes)?.row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_missing_directory() {
        let connector = LocalFilesystemConnector::new(LocalFilesystemConnectionSpec {
            root_path: "/nonexistent/path/for/test".to_owned(),
        });
        assert!(connector.connect().await.is_err());
    }

    #[tokio::test]
    async fn list_tables_enumerates_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("orders")).unwrap();
        std::fs::create_dir(dir.path().join("users")).unwrap();

        let connector = LocalFilesystemConnector::new(LocalFilesystemConnectionSpec {
            root_path: dir.path().to_string_lossy().into_owned(),
        });
        connector.connect().await.unwrap();
        let tables = connector.list_tables().await.unwrap();
        let mut names: Vec<_> = tables.into_iter().map(|t| t.name).collect();
        names.sort();
        assert_eq!(names, vec!["orders", "users"]);
    }
}
