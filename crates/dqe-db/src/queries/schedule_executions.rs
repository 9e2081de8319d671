//! Database query functions for the `schedule_executions` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ScheduleExecution, ScheduleExecutionStatus};

/// Start a new execution row for a schedule firing. `status` begins at
/// `running`.
pub async fn start_execution(pool: &PgPool, schedule_id: Uuid) -> Result<ScheduleExecution> {
    let row = sqlx::query_as::<_, ScheduleExecution>(
        "INSERT INTO schedule_executions (schedule_id, status, summary) \
         VALUES ($1, 'running', '{}'::jsonb) \
         RETURNING *",
    )
    .bind(schedule_id)
    .fetch_one(pool)
    .await
    .context("failed to start schedule execution")?;

    Ok(row)
}

/// Fetch a single schedule execution by id.
pub async fn get_execution(pool: &PgPool, id: Uuid) -> Result<Option<ScheduleExecution>> {
    let row = sqlx::query_as::<_, ScheduleExecution>("SELECT * FROM schedule_executions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch schedule execution")?;

    Ok(row)
}

/// List executions for a schedule, newest first, capped at `limit`.
pub async fn list_executions_for_schedule(
    pool: &PgPool,
    schedule_id: Uuid,
    limit: i64,
) -> Result<Vec<ScheduleExecution>> {
    let rows = sqlx::query_as::<_, ScheduleExecution>(
        "SELECT * FROM schedule_executions WHERE schedule_id = $1 ORDER BY started_at DESC LIMIT $2",
    )
    .bind(schedule_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list executions for schedule")?;

    Ok(rows)
}

/// Mark an execution finished: set status, `completed_at`, duration,
/// summary counts, and the number of alerts dispatched.
#[allow(clippy::too_many_arguments)]
pub async fn complete_execution(
    pool: &PgPool,
    id: Uuid,
    status: ScheduleExecutionStatus,
    duration_ms: i64,
    summary: serde_json::Value,
    alerts_sent: i32,
    error: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE schedule_executions \
         SET status = $1, completed_at = NOW(), duration_ms = $2, summary = $3, \
             alerts_sent = $4, error = $5 \
         WHERE id = $6",
    )
    .bind(status)
    .bind(duration_ms)
    .bind(summary)
    .bind(alerts_sent)
    .bind(error)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to complete schedule execution")?;

    Ok(result.rows_affected())
}

/// Reset executions stuck in `running` back to `failed`. Used for restart
/// recovery when the scheduler process crashes mid-firing.
pub async fn reset_orphaned_executions(pool: &PgPool) -> Result<Vec<ScheduleExecution>> {
    let rows = sqlx::query_as::<_, ScheduleExecution>(
        "UPDATE schedule_executions \
         SET status = 'failed', completed_at = NOW(), error = 'orphaned by scheduler restart' \
         WHERE status = 'running' \
         RETURNING *",
    )
    .fetch_all(pool)
    .await
    .context("failed to reset orphaned schedule executions")?;

    Ok(rows)
}
