//! Database query functions for the `checks` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Check, CheckStatus, CheckType, Severity};

/// Insert a new check (Check).
#[allow(clippy::too_many_arguments)]
pub async fn insert_check(
    pool: &PgPool,
    tenant_id: &str,
    name: &str,
    datasource_id: Uuid,
    view_id: Option<Uuid>,
    check_type: CheckType,
    table_name: &str,
    column_name: Option<&str>,
    parameters: serde_json::Value,
    threshold: serde_json::Value,
    severity: Severity,
    tags: &[String],
) -> Result<Check> {
    let row = sqlx::query_as::<_, Check>(
        "INSERT INTO checks \
         (tenant_id, name, datasource_id, view_id, check_type, table_name, column_name, \
          parameters, threshold, severity, tags) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING *",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(datasource_id)
    .bind(view_id)
    .bind(check_type)
    .bind(table_name)
    .bind(column_name)
    .bind(parameters)
    .bind(threshold)
    .bind(severity)
    .bind(tags)
    .fetch_one(pool)
    .await
    .context("failed to insert check")?;

    Ok(row)
}

/// Fetch a single check by id, scoped to a tenant.
pub async fn get_check(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<Option<Check>> {
    let row = sqlx::query_as::<_, Check>("SELECT * FROM checks WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch check")?;

    Ok(row)
}

/// Fetch many checks by id, scoped to a tenant. Used when a schedule
/// enumerates an explicit `check_ids` list.
pub async fn get_checks_by_ids(pool: &PgPool, tenant_id: &str, ids: &[Uuid]) -> Result<Vec<Check>> {
    let rows = sqlx::query_as::<_, Check>("SELECT * FROM checks WHERE tenant_id = $1 AND id = ANY($2) ORDER BY name")
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(pool)
        .await
        .context("failed to fetch checks by ids")?;

    Ok(rows)
}

/// List all active checks bound to a given datasource. Used when a schedule
/// references a datasource rather than an explicit check list.
pub async fn list_active_checks_for_datasource(pool: &PgPool, tenant_id: &str, datasource_id: Uuid) -> Result<Vec<Check>> {
    let rows = sqlx::query_as::<_, Check>(
        "SELECT * FROM checks \
         WHERE tenant_id = $1 AND datasource_id = $2 AND active = TRUE \
         ORDER BY name",
    )
    .bind(tenant_id)
    .bind(datasource_id)
    .fetch_all(pool)
    .await
    .context("failed to list active checks for datasource")?;

    Ok(rows)
}

/// List all checks for a tenant, optionally filtering by datasource and/or
/// severity.
pub async fn list_checks(pool: &PgPool, tenant_id: &str, datasource_id: Option<Uuid>, severity: Option<Severity>) -> Result<Vec<Check>> {
    let rows = sqlx::query_as::<_, Check>(
        "SELECT * FROM checks \
         WHERE tenant_id = $1 \
         AND ($2::uuid IS NULL OR datasource_id = $2) \
         AND ($3::text IS NULL OR severity = $3) \
         ORDER BY name",
    )
    .bind(tenant_id)
    .bind(datasource_id)
    .bind(severity.map(|s| s.to_string()))
    .fetch_all(pool)
    .await
    .context("failed to list checks")?;

    Ok(rows)
}

/// Update a check's mutable fields (parameters, threshold, severity, tags,
/// active flag).
#[allow(clippy::too_many_arguments)]
pub async fn update_check(
    pool: &PgPool,
    tenant_id: &str,
    id: Uuid,
    parameters: serde_json::Value,
    threshold: serde_json::Value,
    severity: Severity,
    tags: &[String],
    active: bool,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE checks \
         SET parameters = $1, threshold = $2, severity = $3, tags = $4, active = $5, \
             updated_at = NOW() \
         WHERE id = $6 AND tenant_id = $7",
    )
    .bind(parameters)
    .bind(threshold)
    .bind(severity)
    .bind(tags)
    .bind(active)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("failed to update check")?;

    Ok(result.rows_affected())
}

/// Record the outcome of a check run on the `checks` row itself
/// (`last_run_at`/`last_status` denormalized fields).
pub async fn record_check_run(pool: &PgPool, id: Uuid, status: CheckStatus) -> Result<u64> {
    let result = sqlx::query("UPDATE checks SET last_run_at = NOW(), last_status = $1 WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to record check run")?;

    Ok(result.rows_affected())
}

/// Delete a check.
pub async fn delete_check(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM checks WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("failed to delete check")?;

    Ok(result.rows_affected())
}
