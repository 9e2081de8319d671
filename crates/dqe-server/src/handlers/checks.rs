use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use dqe_core::check;
use dqe_core::connector::sql::validate_table_ident;
use dqe_core::view::ViewDefinition;
use dqe_db::models::{Check, CheckResult, CheckType, Severity};
use dqe_db::queries::{check_results, checks, views};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub datasource_id: Option<Uuid>,
    #[serde(default)]
    pub severity: Option<Severity>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckRequest {
    pub name: String,
    pub datasource_id: Uuid,
    #[serde(default)]
    pub view_id: Option<Uuid>,
    pub check_type: CheckType,
    pub table_name: String,
    #[serde(default)]
    pub column_name: Option<String>,
    pub parameters: serde_json::Value,
    #[serde(default = "default_threshold")]
    pub threshold: serde_json::Value,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_threshold() -> serde_json::Value {
    serde_json::json!({})
}

#[derive(Debug, Deserialize)]
pub struct UpdateCheckRequest {
    pub parameters: serde_json::Value,
    #[serde(default = "default_threshold")]
    pub threshold: serde_json::Value,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Check>>, AppError> {
    let rows = checks::list_checks(&state.pool, &tenant.tenant_id, query.datasource_id, query.severity).await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(req): Json<CreateCheckRequest>,
) -> Result<(axum::http::StatusCode, Json<Check>), AppError> {
    let row = checks::insert_check(
        &state.pool,
        &tenant.tenant_id,
        &req.name,
        req.datasource_id,
        req.view_id,
        req.check_type,
        &req.table_name,
        req.column_name.as_deref(),
        req.parameters,
        req.threshold,
        req.severity,
        &req.tags,
    )
    .await?;
    Ok((axum::http::StatusCode::CREATED, Json(row)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Check>, AppError> {
    let row = checks::get_check(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("check {id} not found")))?;
    Ok(Json(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCheckRequest>,
) -> Result<Json<Check>, AppError> {
    checks::update_check(&state.pool, &tenant.tenant_id, id, req.parameters, req.threshold, req.severity, &req.tags, req.active).await?;
    let row = checks::get_check(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("check {id} not found")))?;
    Ok(Json(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    let affected = checks::delete_check(&state.pool, &tenant.tenant_id, id).await?;
    if affected == 0 {
        return Err(AppError::not_found(format!("check {id} not found")));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Synchronous, ad hoc execution of one check: `POST /checks/{id}/run`.
/// The result is persisted exactly like a schedule-driven run (so
/// `list_results_for_check` sees it) but is not attached to a schedule
/// execution.
pub async fn run(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckResult>, AppError> {
    let check_row = checks::get_check(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("check {id} not found")))?;

    let connector = state.registry.get(check_row.datasource_id).await?;
    let target = resolve_target(&state, &check_row).await?;

    let outcome = check::execute(connector.as_ref(), &check_row, &target).await;

    let result = check_results::insert_check_result(
        &state.pool,
        check_row.id,
        None,
        outcome.status,
        outcome.actual_value,
        outcome.expected_value.as_deref(),
        Some(&outcome.message),
        outcome.details,
        outcome.duration_ms,
        outcome.error.as_deref(),
    )
    .await?;
    checks::record_check_run(&state.pool, check_row.id, outcome.status).await?;

    Ok(Json(result))
}

pub async fn results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<CheckResult>>, AppError> {
    let rows = check_results::list_results_for_check(&state.pool, id, query.limit).await?;
    Ok(Json(rows))
}

async fn resolve_target(state: &AppState, check_row: &Check) -> Result<String, AppError> {
    if let Some(view_id) = check_row.view_id {
        let view = views::get_view(&state.pool, &check_row.tenant_id, view_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("view {view_id} not found")))?;
        let definition: ViewDefinition =
            serde_json::from_value(view.definition).map_err(|e| AppError::bad_request(format!("stored view definition is malformed: {e}")))?;
        Ok(definition.as_target()?)
    } else {
        validate_table_ident(&check_row.table_name)?;
        Ok(check_row.table_name.clone())
    }
}
