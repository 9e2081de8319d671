use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::connector::Connector;
use crate::error::{Error, Result};

/// Process-wide cache of live connector handles, keyed by datasource ID.
///
/// A handle survives metadata updates that do not touch connection fields;
/// only `remove` (called by `delete_datasource`) or a connection-field
/// update closes it.
pub struct ConnectorRegistry {
    handles: RwLock<HashMap<Uuid, Arc<dyn Connector>>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Register a freshly-connected, pinged connector under a datasource ID.
    pub async fn register(&self, datasource_id: Uuid, connector: Arc<dyn Connector>) {
        self.handles.write().await.insert(datasource_id, connector);
    }

    /// Look up a cached connector handle.
    pub async fn get(&self, datasource_id: Uuid) -> Result<Arc<dyn Connector>> {
        self.handles
            .read()
            .await
            .get(&datasource_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no connector registered for datasource {datasource_id}")))
    }

    /// Remove and close a connector handle. Idempotent: removing an absent
    /// handle is not an error.
    pub async fn remove(&self, datasource_id: Uuid) -> Result<()> {
        let removed = self.handles.write().await.remove(&datasource_id);
        if let Some(connector) = removed {
            connector.close().await?;
        }
        Ok(())
    }

    /// Number of cached handles.
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dqe_db::models::DatasourceType;

    use crate::connector::{ColumnInfo, QueryResult, TableInfo, Value};

    struct NullConnector;

    #[async_trait]
    impl Connector for NullConnector {
        fn kind(&self) -> DatasourceType {
            DatasourceType::Postgresql
        }
        async fn connect(&self) -> Result<()> {
            Ok(())
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
        async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
            Ok(QueryResult::default())
        }
        async fn list_tables(&self) -> Result<Vec<TableInfo>> {
            Ok(vec![])
        }
        async fn list_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
            Ok(vec![])
        }
        async fn row_count(&self, _table: &str) -> Result<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn register_and_get_roundtrip() {
        let registry = ConnectorRegistry::new();
        let id = Uuid::new_v4();
        assert!(registry.is_empty().await);

        registry.register(id, Arc::new(NullConnector)).await;
        assert_eq!(registry.len().await, 1);

        let fetched = registry.get(id).await.expect("should be registered");
        fetched.ping().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_returns_not_found() {
        let registry = ConnectorRegistry::new();
        let err = registry.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_closes_and_evicts() {
        let registry = ConnectorRegistry::new();
        let id = Uuid::new_v4();
        registry.register(id, Arc::new(NullConnector)).await;

        registry.remove(id).await.unwrap();
        assert!(registry.is_empty().await);
        assert!(registry.get(id).await.is_err());
    }
}
