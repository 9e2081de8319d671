//! Unauthenticated operational endpoints: `/health` (liveness + DB
//! connectivity) and `/metrics` (a handful of counters in Prometheus text
//! exposition format).

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await.map_err(|e| AppError::internal(format!("database ping failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok",
        database: "ok",
    }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<String, AppError> {
    let active_schedules = state.scheduler.active_count().await;
    let connectors = state.registry.len().await;

    Ok(format!(
        "# HELP dqe_active_schedules Number of schedules with a running supervisor task.\n\
         # TYPE dqe_active_schedules gauge\n\
         dqe_active_schedules {active_schedules}\n\
         # HELP dqe_registered_connectors Number of datasource connectors currently held open.\n\
         # TYPE dqe_registered_connectors gauge\n\
         dqe_registered_connectors {connectors}\n"
    ))
}
