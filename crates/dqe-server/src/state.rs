use std::sync::Arc;

use dqe_core::connector::registry::ConnectorRegistry;
use dqe_core::scheduler::Scheduler;
use sqlx::PgPool;

use crate::config::EngineConfig;

/// Shared process state handed to every handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<ConnectorRegistry>,
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<EngineConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: EngineConfig) -> Self {
        let registry = Arc::new(ConnectorRegistry::new());
        let scheduler = Arc::new(Scheduler::new(pool.clone(), registry.clone()));
        Self {
            pool,
            registry,
            scheduler,
            config: Arc::new(config),
        }
    }
}
