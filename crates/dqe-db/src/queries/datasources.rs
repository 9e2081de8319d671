//! Database query functions for the `datasources` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Datasource, DatasourceType};

/// Insert a new datasource. `connection` is the dialect-specific connection
/// bag, stored as opaque JSON (Datasource).
pub async fn insert_datasource(
    pool: &PgPool,
    tenant_id: &str,
    name: &str,
    datasource_type: DatasourceType,
    connection: serde_json::Value,
) -> Result<Datasource> {
    let row = sqlx::query_as::<_, Datasource>(
        "INSERT INTO datasources (tenant_id, name, datasource_type, connection) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(datasource_type)
    .bind(connection)
    .fetch_one(pool)
    .await
    .context("failed to insert datasource")?;

    Ok(row)
}

/// Fetch a single datasource by id, scoped to a tenant.
pub async fn get_datasource(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<Option<Datasource>> {
    let row = sqlx::query_as::<_, Datasource>("SELECT * FROM datasources WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch datasource")?;

    Ok(row)
}

/// List all datasources for a tenant, optionally filtering to active ones.
pub async fn list_datasources(pool: &PgPool, tenant_id: &str, active_only: bool) -> Result<Vec<Datasource>> {
    let rows = if active_only {
        sqlx::query_as::<_, Datasource>("SELECT * FROM datasources WHERE tenant_id = $1 AND active = TRUE ORDER BY name")
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    } else {
        sqlx::query_as::<_, Datasource>("SELECT * FROM datasources WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
    .context("failed to list datasources")?;

    Ok(rows)
}

/// List every active datasource across all tenants. The server loads this
/// set at startup to repopulate the connector registry after a restart.
pub async fn list_all_active_datasources(pool: &PgPool) -> Result<Vec<Datasource>> {
    let rows = sqlx::query_as::<_, Datasource>("SELECT * FROM datasources WHERE active = TRUE")
        .fetch_all(pool)
        .await
        .context("failed to list active datasources")?;

    Ok(rows)
}

/// Update a datasource's connection bag and/or active flag.
pub async fn update_datasource(pool: &PgPool, tenant_id: &str, id: Uuid, connection: serde_json::Value, active: bool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE datasources \
         SET connection = $1, active = $2, updated_at = NOW() \
         WHERE id = $3 AND tenant_id = $4",
    )
    .bind(connection)
    .bind(active)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("failed to update datasource")?;

    Ok(result.rows_affected())
}

/// Delete a datasource. Fails at the database level (foreign key
/// constraint) if checks or views still reference it.
pub async fn delete_datasource(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM datasources WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("failed to delete datasource")?;

    Ok(result.rows_affected())
}
