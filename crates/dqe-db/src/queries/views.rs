//! Database query functions for the `views` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::View;

/// Insert a new view. `definition` is the serialized view AST (View).
pub async fn insert_view(pool: &PgPool, tenant_id: &str, name: &str, datasource_id: Uuid, definition: serde_json::Value) -> Result<View> {
    let row = sqlx::query_as::<_, View>(
        "INSERT INTO views (tenant_id, name, datasource_id, definition) \
         VALUES ($1, $2, $3, $4) \
         RETURNING *",
    )
    .bind(tenant_id)
    .bind(name)
    .bind(datasource_id)
    .bind(definition)
    .fetch_one(pool)
    .await
    .context("failed to insert view")?;

    Ok(row)
}

/// Fetch a single view by id, scoped to a tenant.
pub async fn get_view(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<Option<View>> {
    let row = sqlx::query_as::<_, View>("SELECT * FROM views WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch view")?;

    Ok(row)
}

/// List all views for a tenant.
pub async fn list_views(pool: &PgPool, tenant_id: &str) -> Result<Vec<View>> {
    let rows = sqlx::query_as::<_, View>("SELECT * FROM views WHERE tenant_id = $1 ORDER BY name")
        .bind(tenant_id)
        .fetch_all(pool)
        .await
        .context("failed to list views")?;

    Ok(rows)
}

/// Update a view's definition, clearing the cached validation state so the
/// next validation pass re-derives `columns`.
pub async fn update_view_definition(pool: &PgPool, tenant_id: &str, id: Uuid, definition: serde_json::Value) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE views \
         SET definition = $1, validated_at = NULL, columns = NULL, updated_at = NOW() \
         WHERE id = $2 AND tenant_id = $3",
    )
    .bind(definition)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("failed to update view definition")?;

    Ok(result.rows_affected())
}

/// Record the outcome of validating a view against its datasource: the
/// inferred column list and the validation timestamp.
pub async fn mark_view_validated(pool: &PgPool, tenant_id: &str, id: Uuid, columns: serde_json::Value) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE views \
         SET columns = $1, validated_at = NOW(), updated_at = NOW() \
         WHERE id = $2 AND tenant_id = $3",
    )
    .bind(columns)
    .bind(id)
    .bind(tenant_id)
    .execute(pool)
    .await
    .context("failed to mark view validated")?;

    Ok(result.rows_affected())
}

/// Delete a view.
pub async fn delete_view(pool: &PgPool, tenant_id: &str, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM views WHERE id = $1 AND tenant_id = $2")
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await
        .context("failed to delete view")?;

    Ok(result.rows_affected())
}
