//! Database query functions for the `schedules` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Schedule;

/// Insert a new schedule (Schedule).
#[allow(clippy::too_many_arguments)]
pub async fn insert_schedule(
    pool: &PgPool,
    tenant_id: &str,
    name: &str,
    cron_expression: &str,
    timezone: &str,
    check_ids: &[Uuid],
    datasource_id: Option<Uuid>,
    channel_ids: &[Uuid],
    next_run_at: Option<DateTime<Utc>>,
) -> Result<Schedule> {
    let row = sqlx::query_as::<_, Schedule>(
        "INSERT INTO schedules \
         (tenant_id, name, cron_expression, timezone, check_ids, datasource_id, \
          channel_ids, next_run_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING *",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(cron_expression)
    .bind(timezone)
    .bind(check_ids)
    .bind(datasource_id)
    .bind(channel_ids)
    .bind(next_run_at)
    .fetch_one(pool)
    .await
    .context("failed to insert schedule")?;

    Ok(row)
}

/// Fetch a single schedule by id, scoped to a tenant.
pub async fn get_schedule(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<Option<Schedule>> {
    let row = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch schedule")?;

    Ok(row)
}

/// List all schedules for a tenant.
pub async fn list_schedules(pool: &PgPool, tenant_id: &str) -> Result<Vec<Schedule>> {
    let rows = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE tenant_id = $1 ORDER BY name")
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("failed to list schedules")?;

    Ok(rows)
}

/// List every active schedule across all tenants. The scheduler supervisor
/// loads this set at startup and on each reconciliation tick.
pub async fn list_all_active_schedules(pool: &PgPool) -> Result<Vec<Schedule>> {
    let rows = sqlx::query_as::<_, Schedule>("SELECT * FROM schedules WHERE active = TRUE")
        .fetch_all(pool)
        .await
        .context("failed to list active schedules")?;

    Ok(rows)
}

/// Update a schedule's cron expression, timezone, and membership. Resets
/// `next_run_at` so the caller can recompute it.
#[allow(clippy::too_many_arguments)]
pub async fn update_schedule(
    pool: &PgPool,
    tenant_id: &str,
    id: Uuid,
    cron_expression: &str,
    timezone: &str,
    check_ids: &[Uuid],
    datasource_id: Option<Uuid>,
    channel_ids: &[Uuid],
    active: bool,
    next_run_at: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE schedules \
         SET cron_expression = $1, timezone = $2, check_ids = $3, datasource_id = $4, \
             channel_ids = $5, active = $6, next_run_at = $7, updated_at = NOW() \
         WHERE id = $8 AND tenant_id = $9",
    )
    .bind(cron_expression)
    .bind(timezone)
    .bind(check_ids)
    .bind(datasource_id)
    .bind(channel_ids)
    .bind(active)
    .bind(next_run_at)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("failed to update schedule")?;

    Ok(result.rows_affected())
}

/// Record that a schedule fired: set `last_run_at` to now and `next_run_at`
/// to the freshly-computed next fire time.
pub async fn record_schedule_fire(pool: &PgPool, id: Uuid, next_run_at: Option<DateTime<Utc>>) -> Result<u64> {
    let result = sqlx::query("UPDATE schedules SET last_run_at = NOW(), next_run_at = $1 WHERE id = $2")
        .bind(next_run_at)
        .bind(id)
        .execute(pool)
        .await
        .context("failed to record schedule fire")?;

    Ok(result.rows_affected())
}

/// Delete a schedule.
pub async fn delete_schedule(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM schedules WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("failed to delete schedule")?;

    Ok(result.rows_affected())
}
