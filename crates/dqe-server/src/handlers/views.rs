use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use dqe_core::connector::QueryResult;
use dqe_core::view::ViewDefinition;
use dqe_db::models::View;
use dqe_db::queries::views;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateViewRequest {
    pub name: String,
    pub datasource_id: Uuid,
    pub definition: ViewDefinition,
}

#[derive(Debug, Deserialize)]
pub struct UpdateViewRequest {
    pub definition: ViewDefinition,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub columns: Option<Vec<String>>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SqlResponse {
    pub sql: String,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<Json<Vec<View>>, AppError> {
    let rows = views::list_views(&state.pool, &tenant.tenant_id).await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(req): Json<CreateViewRequest>,
) -> Result<(axum::http::StatusCode, Json<View>), AppError> {
    req.definition.validate()?;
    let definition = serde_json::to_value(&req.definition).map_err(|e| AppError::internal(format!("failed to serialize view definition: {e}")))?;
    let row = views::insert_view(&state.pool, &tenant.tenant_id, &req.name, req.datasource_id, definition).await?;
    run_validation_probe(&state, &tenant, &row, &req.definition).await;
    let row = views::get_view(&state.pool, &tenant.tenant_id, row.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {} not found", row.id)))?;
    Ok((axum::http::StatusCode::CREATED, Json(row)))
}

/// Runs the validation probe described in the view's lifecycle: success
/// caches the inferred column list and stamps `validated_at`; failure (an
/// unreachable connector, or a probe error) leaves both unset -- the view
/// still persists, but checks targeting it are not runnable until a
/// validation pass succeeds.
async fn run_validation_probe(state: &AppState, tenant: &TenantContext, row: &View, definition: &ViewDefinition) {
    let Ok(connector) = state.registry.get(row.datasource_id).await else {
        return;
    };
    let Ok(probe) = definition.validation_probe() else {
        return;
    };
    if let Ok(result) = connector.query(&probe, &[]).await {
        if let Ok(columns_json) = serde_json::to_value(&result.columns) {
            let _ = views::mark_view_validated(&state.pool, &tenant.tenant_id, row.id, columns_json).await;
        }
    }
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<View>, AppError> {
    let row = views::get_view(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {id} not found")))?;
    Ok(Json(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateViewRequest>,
) -> Result<Json<View>, AppError> {
    req.definition.validate()?;
    let definition = serde_json::to_value(&req.definition).map_err(|e| AppError::internal(format!("failed to serialize view definition: {e}")))?;
    views::update_view_definition(&state.pool, &tenant.tenant_id, id, definition).await?;
    let row = views::get_view(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {id} not found")))?;
    run_validation_probe(&state, &tenant, &row, &req.definition).await;
    let row = views::get_view(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {id} not found")))?;
    Ok(Json(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let affected = views::delete_view(&state.pool, &tenant.tenant_id, id).await?;
    if affected == 0 {
        return Err(AppError::not_found(format!("view {id} not found")));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Previews rows from the view, capped at `limit` (default 100).
pub async fn query(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<QueryResult>, AppError> {
    let view = views::get_view(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {id} not found")))?;
    let definition: ViewDefinition =
        serde_json::from_value(view.definition).map_err(|e| AppError::bad_request(format!("stored view definition is malformed: {e}")))?;

    let connector = state.registry.get(view.datasource_id).await?;
    let sql = format!("SELECT * FROM {} LIMIT {}", definition.as_target()?, query.limit);
    let result = connector.query(&sql, &[]).await?;
    Ok(Json(result))
}

/// Runs the view's validation probe against its datasource and, on success,
/// caches the inferred column list.
pub async fn validate(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ValidateResponse>, AppError> {
    let view = views::get_view(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {id} not found")))?;
    let definition: ViewDefinition =
        serde_json::from_value(view.definition).map_err(|e| AppError::bad_request(format!("stored view definition is malformed: {e}")))?;

    let connector = state.registry.get(view.datasource_id).await?;
    let probe = definition.validation_probe()?;

    Ok(Json(match connector.query(&probe, &[]).await {
        Ok(result) => {
            let columns = result.columns.clone();
            let columns_json = serde_json::to_value(&columns).map_err(|e| AppError::internal(format!("failed to serialize column list: {e}")))?;
            views::mark_view_validated(&state.pool, &tenant.tenant_id, id, columns_json).await?;
            ValidateResponse {
                valid: true,
                columns: Some(columns),
                error: None,
            }
        }
        Err(e) => ValidateResponse {
            valid: false,
            columns: None,
            error: Some(e.to_string()),
        },
    }))
}

pub async fn sql(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SqlResponse>, AppError> {
    let view = views::get_view(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("view {id} not found")))?;
    let definition: ViewDefinition =
        serde_json::from_value(view.definition).map_err(|e| AppError::bad_request(format!("stored view definition is malformed: {e}")))?;
    Ok(Json(SqlResponse { sql: definition.to_sql()? }))
}
