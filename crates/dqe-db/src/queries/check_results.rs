//! Database query functions for the `check_results` table.
//!
//! Rows are append-only: a `CheckResult` is written once and never updated
//! (CheckResult).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CheckResult, CheckStatus};

/// Insert a new check result.
#[allow(clippy::too_many_arguments)]
pub async fn insert_check_result(
    pool: &PgPool,
    check_id: Uuid,
    schedule_execution_id: Option<Uuid>,
    status: CheckStatus,
    actual_value: Option<f64>,
    expected_value: Option<&str>,
    message: Option<&str>,
    details: serde_json::Value,
    duration_ms: i64,
    error: Option<&str>,
) -> Result<CheckResult> {
    let row = sqlx::query_as::<_, CheckResult>(
        "INSERT INTO check_results \
         (check_id, schedule_execution_id, status, actual_value, expected_value, \
          message, details, duration_ms, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING *",
    )
    .bind(check_id)
    .bind(schedule_execution_id)
    .bind(status)
    .bind(actual_value)
    .bind(expected_value)
    .bind(message)
    .bind(details)
    .bind(duration_ms)
    .bind(error)
    .fetch_one(pool)
    .await
    .context("failed to insert check result")?;

    Ok(row)
}

/// Fetch a single check result by id.
pub async fn get_check_result(pool: &PgPool, id: Uuid) -> Result<Option<CheckResult>> {
    let row = sqlx::query_as::<_, CheckResult>("SELECT * FROM check_results WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch check result")?;

    Ok(row)
}

/// List the most recent results for a check, newest first, capped at `limit`.
pub async fn list_results_for_check(pool: &PgPool, check_id: Uuid, limit: i64) -> Result<Vec<CheckResult>> {
    let rows = sqlx::query_as::<_, CheckResult>("SELECT * FROM check_results WHERE check_id = $1 ORDER BY timestamp DESC LIMIT $2")
        .bind(check_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list results for check")?;

    Ok(rows)
}

/// List all results produced by a given schedule execution.
pub async fn list_results_for_execution(pool: &PgPool, schedule_execution_id: Uuid) -> Result<Vec<CheckResult>> {
    let rows = sqlx::query_as::<_, CheckResult>("SELECT * FROM check_results WHERE schedule_execution_id = $1 ORDER BY timestamp ASC")
        .bind(schedule_execution_id)
        .fetch_all(pool)
        .await
        .context("failed to list results for execution")?;

    Ok(rows)
}

/// Fetch the most recent result for a check, if any.
pub async fn latest_result_for_check(pool: &PgPool, check_id: Uuid) -> Result<Option<CheckResult>> {
    let row = sqlx::query_as::<_, CheckResult>("SELECT * FROM check_results WHERE check_id = $1 ORDER BY timestamp DESC LIMIT 1")
        .bind(check_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch latest result for check")?;

    Ok(row)
}
