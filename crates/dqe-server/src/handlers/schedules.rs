use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use chrono::Utc;
use dqe_core::scheduler::cron_util;
use dqe_db::models::{Schedule, ScheduleExecution};
use dqe_db::queries::{schedule_executions, schedules};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub name: String,
    pub cron_expression: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub check_ids: Vec<Uuid>,
    #[serde(default)]
    pub datasource_id: Option<Uuid>,
    #[serde(default)]
    pub channel_ids: Vec<Uuid>,
}

fn default_timezone() -> String {
    "UTC".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub cron_expression: String,
    pub timezone: String,
    #[serde(default)]
    pub check_ids: Vec<Uuid>,
    #[serde(default)]
    pub datasource_id: Option<Uuid>,
    #[serde(default)]
    pub channel_ids: Vec<Uuid>,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    let rows = schedules::list_schedules(&state.pool, &tenant.tenant_id).await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<(axum::http::StatusCode, Json<Schedule>), AppError> {
    cron_util::validate(&req.cron_expression)?;
    let next_run_at = cron_util::next_fire(&req.cron_expression, &req.timezone, Utc::now()).ok();

    let row = schedules::insert_schedule(
        &state.pool,
        &tenant.tenant_id,
        &req.name,
        &req.cron_expression,
        &req.timezone,
        &req.check_ids,
        req.datasource_id,
        &req.channel_ids,
        next_run_at,
    )
    .await?;

    if row.active {
        state.scheduler.spawn(row.clone()).await;
    }

    Ok((axum::http::StatusCode::CREATED, Json(row)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Schedule>, AppError> {
    let row = schedules::get_schedule(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("schedule {id} not found")))?;
    Ok(Json(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateScheduleRequest>,
) -> Result<Json<Schedule>, AppError> {
    cron_util::validate(&req.cron_expression)?;
    let next_run_at = cron_util::next_fire(&req.cron_expression, &req.timezone, Utc::now()).ok();

    schedules::update_schedule(
        &state.pool,
        &tenant.tenant_id,
        id,
        &req.cron_expression,
        &req.timezone,
        &req.check_ids,
        req.datasource_id,
        &req.channel_ids,
        req.active,
        next_run_at,
    )
    .await?;

    let row = schedules::get_schedule(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("schedule {id} not found")))?;

    if row.active {
        state.scheduler.spawn(row.clone()).await;
    } else {
        state.scheduler.cancel(id).await;
    }

    Ok(Json(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    state.scheduler.cancel(id).await;
    let affected = schedules::delete_schedule(&state.pool, &tenant.tenant_id, id).await?;
    if affected == 0 {
        return Err(AppError::not_found(format!("schedule {id} not found")));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Fires a schedule immediately, out of band from its cron cadence.
pub async fn run(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduleExecution>, AppError> {
    let execution = state.scheduler.run_now(id, &tenant.tenant_id).await?;
    Ok(Json(execution))
}

pub async fn executions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Vec<ScheduleExecution>>, AppError> {
    let rows = schedule_executions::list_executions_for_schedule(&state.pool, id, query.limit).await?;
    Ok(Json(rows))
}
