//! Database query functions for the `alert_history` table.
//!
//! Rows are append-only, one per delivery attempt (AlertHistory).

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AlertHistory, AlertOutcome};

/// Record a delivery attempt.
pub async fn insert_alert_history(
    pool: &PgPool,
    channel_id: Uuid,
    schedule_execution_id: Option<Uuid>,
    outcome: AlertOutcome,
    error: Option<&str>,
) -> Result<AlertHistory> {
    let row = sqlx::query_as::<_, AlertHistory>(
        "INSERT INTO alert_history (channel_id, schedule_execution_id, outcome, error) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(channel_id)
    .bind(schedule_execution_id)
    .bind(outcome)
    .bind(error)
    .fetch_one(pool)
    .await
    .context("failed to insert alert history")?;

    Ok(row)
}

/// List delivery history for a channel, newest first, capped at `limit`.
pub async fn list_history_for_channel(pool: &PgPool, channel_id: Uuid, limit: i64) -> Result<Vec<AlertHistory>> {
    let rows = sqlx::query_as::<_, AlertHistory>("SELECT * FROM alert_history WHERE channel_id = $1 ORDER BY sent_at DESC LIMIT $2")
        .bind(channel_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("failed to list history for channel")?;

    Ok(rows)
}

/// List delivery history produced by a given schedule execution.
pub async fn list_history_for_execution(pool: &PgPool, schedule_execution_id: Uuid) -> Result<Vec<AlertHistory>> {
    let rows = sqlx::query_as::<_, AlertHistory>("SELECT * FROM alert_history WHERE schedule_execution_id = $1 ORDER BY sent_at ASC")
        .bind(schedule_execution_id)
        .fetch_all(pool)
        .await
        .context("failed to list history for execution")?;

    Ok(rows)
}
