//! Database query functions for the `alert_channels` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AlertChannel, AlertChannelType, Severity};

/// Insert a new alert channel (AlertChannel).
pub async fn insert_alert_channel(
    pool: &PgPool,
    tenant_id: &str,
    name: &str,
    channel_type: AlertChannelType,
    configuration: serde_json::Value,
    min_severity: Severity,
) -> Result<AlertChannel> {
    let row = sqlx::query_as::<_, AlertChannel>(
        "INSERT INTO alert_channels (tenant_id, name, channel_type, configuration, min_severity) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(channel_type)
    .bind(configuration)
    .bind(min_severity)
    .fetch_one(pool)
    .await
    .context("failed to insert alert channel")?;

    Ok(row)
}

/// Fetch a single alert channel by id, scoped to a tenant.
pub async fn get_alert_channel(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<Option<AlertChannel>> {
    let row = sqlx::query_as::<_, AlertChannel>("SELECT * FROM alert_channels WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch alert channel")?;

    Ok(row)
}

/// Fetch many alert channels by id, scoped to a tenant. Used when a
/// schedule's `channel_ids` need resolving for dispatch.
pub async fn get_channels_by_ids(pool: &PgPool, tenant_id: &str, ids: &[Uuid]) -> Result<Vec<AlertChannel>> {
    let rows = sqlx::query_as::<_, AlertChannel>("SELECT * FROM alert_channels WHERE tenant_id = $1 AND id = ANY($2) AND active = TRUE")
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(pool)
        .await
        .context("failed to fetch alert channels by ids")?;

    Ok(rows)
}

/// List all alert channels for a tenant.
pub async fn list_alert_channels(pool: &PgPool, tenant_id: &str) -> Result<Vec<AlertChannel>> {
    let rows = sqlx::query_as::<_, AlertChannel>("SELECT * FROM alert_channels WHERE tenant_id = $1 ORDER BY name")
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("failed to list alert channels")?;

    Ok(rows)
}

/// Update an alert channel's configuration, minimum severity, and active flag.
pub async fn update_alert_channel(
    pool: &PgPool,
    tenant_id: &str,
    id: Uuid,
    configuration: serde_json::Value,
    min_severity: Severity,
    active: bool,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE alert_channels \
         SET configuration = $1, min_severity = $2, active = $3, updated_at = NOW() \
         WHERE id = $4 AND tenant_id = $5",
    )
    .bind(configuration)
    .bind(min_severity)
    .bind(active)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("failed to update alert channel")?;

    Ok(result.rows_affected())
}

/// Delete an alert channel.
pub async fn delete_alert_channel(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM alert_channels WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("failed to delete alert channel")?;

    Ok(result.rows_affected())
}
