use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use dqe_core::alert;
use dqe_db::models::{AlertChannel, AlertChannelType, AlertHistory, Severity};
use dqe_db::queries::{alert_channels, alert_history};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateAlertChannelRequest {
    pub name: String,
    pub channel_type: AlertChannelType,
    pub configuration: serde_json::Value,
    pub min_severity: Severity,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertChannelRequest {
    pub configuration: serde_json::Value,
    pub min_severity: Severity,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct TestAlertResponse {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub channel_id: Uuid,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<Json<Vec<AlertChannel>>, AppError> {
    let rows = alert_channels::list_alert_channels(&state.pool, &tenant.tenant_id).await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(req): Json<CreateAlertChannelRequest>,
) -> Result<(axum::http::StatusCode, Json<AlertChannel>), AppError> {
    let row = alert_channels::insert_alert_channel(&state.pool, &tenant.tenant_id, &req.name, req.channel_type, req.configuration, req.min_severity).await?;
    Ok((axum::http::StatusCode::CREATED, Json(row)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<AlertChannel>, AppError> {
    let row = alert_channels::get_alert_channel(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("alert channel {id} not found")))?;
    Ok(Json(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAlertChannelRequest>,
) -> Result<Json<AlertChannel>, AppError> {
    alert_channels::update_alert_channel(&state.pool, &tenant.tenant_id, id, req.configuration, req.min_severity, req.active).await?;
    let row = alert_channels::get_alert_channel(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("alert channel {id} not found")))?;
    Ok(Json(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let affected = alert_channels::delete_alert_channel(&state.pool, &tenant.tenant_id, id).await?;
    if affected == 0 {
        return Err(AppError::not_found(format!("alert channel {id} not found")));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Sends a synthetic test alert through a channel without recording it to
/// history. Delivery failures are not request errors.
pub async fn test(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TestAlertResponse>, AppError> {
    let channel = alert_channels::get_alert_channel(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("alert channel {id} not found")))?;

    Ok(Json(match alert::test_channel(&channel).await {
        Ok(()) => TestAlertResponse { success: true, error: None },
        Err(e) => TestAlertResponse {
            success: false,
            error: Some(e.to_string()),
        },
    }))
}

pub async fn history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> Result<Json<Vec<AlertHistory>>, AppError> {
    let rows = alert_history::list_history_for_channel(&state.pool, query.channel_id, query.limit).await?;
    Ok(Json(rows))
}
