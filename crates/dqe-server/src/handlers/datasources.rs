use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use dqe_core::connector::factory;
use dqe_core::connector::TableInfo;
use dqe_db::models::{Check, Datasource, DatasourceType};
use dqe_db::queries::{checks, datasources};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub active_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatasourceRequest {
    pub name: String,
    pub datasource_type: DatasourceType,
    pub connection: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDatasourceRequest {
    pub connection: serde_json::Value,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Datasource>>, AppError> {
    let rows = datasources::list_datasources(&state.pool, &tenant.tenant_id, query.active_only.unwrap_or(false)).await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Json(req): Json<CreateDatasourceRequest>,
) -> Result<(axum::http::StatusCode, Json<Datasource>), AppError> {
    let connector = factory::build(req.datasource_type, &req.connection)?;
    connector.connect().await?;
    connector.ping().await?;

    let row = datasources::insert_datasource(&state.pool, &tenant.tenant_id, &req.name, req.datasource_type, req.connection).await?;
    state.registry.register(row.id, connector).await;

    Ok((axum::http::StatusCode::CREATED, Json(row)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Datasource>, AppError> {
    let row = datasources::get_datasource(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("datasource {id} not found")))?;
    Ok(Json(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDatasourceRequest>,
) -> Result<Json<Datasource>, AppError> {
    let existing = datasources::get_datasource(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("datasource {id} not found")))?;

    if req.active {
        let connector = factory::build(existing.datasource_type, &req.connection)?;
        connector.connect().await?;
        connector.ping().await?;
        state.registry.remove(id).await?;
        state.registry.register(id, connector).await;
    } else {
        state.registry.remove(id).await?;
    }

    datasources::update_datasource(&state.pool, &tenant.tenant_id, id, req.connection, req.active).await?;
    let row = datasources::get_datasource(&state.pool, &tenant.tenant_id, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("datasource {id} not found")))?;
    Ok(Json(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    state.registry.remove(id).await?;
    let affected = datasources::delete_datasource(&state.pool, &tenant.tenant_id, id).await?;
    if affected == 0 {
        return Err(AppError::not_found(format!("datasource {id} not found")));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Validates a connection spec without persisting it. Connection failures
/// here are not request errors -- they become a body-level `success: false`
/// at HTTP 200, per the engine's error-handling design.
pub async fn test(Json(req): Json<CreateDatasourceRequest>) -> Json<TestConnectionResponse> {
    let outcome = async {
        let connector = factory::build(req.datasource_type, &req.connection)?;
        connector.connect().await?;
        connector.ping().await?;
        Ok::<(), dqe_core::error::Error>(())
    }
    .await;

    Json(match outcome {
        Ok(()) => TestConnectionResponse {
            success: true,
            message: Some("connection succeeded".to_owned()),
            error: None,
        },
        Err(e) => TestConnectionResponse {
            success: false,
            message: None,
            error: Some(e.to_string()),
        },
    })
}

pub async fn tables(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TableInfo>>, AppError> {
    let connector = state.registry.get(id).await?;
    let tables = connector.list_tables().await?;
    Ok(Json(tables))
}

pub async fn datasource_checks(
    State(state): State<AppState>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Check>>, AppError> {
    let rows = checks::list_active_checks_for_datasource(&state.pool, &tenant.tenant_id, id).await?;
    Ok(Json(rows))
}
