//! Integration tests for datasource and view CRUD operations.

use uuid::Uuid;

use dqe_db::models::DatasourceType;
use dqe_db::queries::{datasources, views};

use dqe_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn insert_and_get_datasource() {
    let (pool, db_name) = create_test_db().await;

    let ds = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "warehouse",
        DatasourceType::Postgresql,
        serde_json::json!({"host": "localhost", "port": 5432, "database": "analytics"}),
    )
    .await
    .expect("insert_datasource should succeed");

    assert_eq!(ds.name, "warehouse");
    assert_eq!(ds.datasource_type, DatasourceType::Postgresql);
    assert!(ds.active);

    let fetched = datasources::get_datasource(&pool, "tenant-a", ds.id)
        .await
        .expect("get_datasource should succeed")
        .expect("datasource should exist");

    assert_eq!(fetched.id, ds.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_datasource_respects_tenant_scope() {
    let (pool, db_name) = create_test_db().await;

    let ds = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "scoped",
        DatasourceType::Mysql,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    let cross_tenant = datasources::get_datasource(&pool, "tenant-b", ds.id)
        .await
        .expect("get_datasource should not error");

    assert!(cross_tenant.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_datasources_filters_active_only() {
    let (pool, db_name) = create_test_db().await;

    let active = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "active-ds",
        DatasourceType::Duckdb,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    let inactive = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "inactive-ds",
        DatasourceType::Duckdb,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    datasources::update_datasource(&pool, "tenant-a", inactive.id, serde_json::json!({}), false)
        .await
        .unwrap();

    let all = datasources::list_datasources(&pool, "tenant-a", false).await.unwrap();
    assert_eq!(all.len(), 2);

    let only_active = datasources::list_datasources(&pool, "tenant-a", true).await.unwrap();
    assert_eq!(only_active.len(), 1);
    assert_eq!(only_active[0].id, active.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn delete_datasource_removes_row() {
    let (pool, db_name) = create_test_db().await;

    let ds = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "to-delete",
        DatasourceType::S3,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    let affected = datasources::delete_datasource(&pool, "tenant-a", ds.id).await.unwrap();
    assert_eq!(affected, 1);

    let gone = datasources::get_datasource(&pool, "tenant-a", ds.id).await.unwrap();
    assert!(gone.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn insert_and_validate_view() {
    let (pool, db_name) = create_test_db().await;

    let ds = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "source",
        DatasourceType::Postgresql,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    let view = views::insert_view(
        &pool,
        "tenant-a",
        "daily_orders",
        ds.id,
        serde_json::json!({"table": "orders", "columns": ["id", "status"]}),
    )
    .await
    .expect("insert_view should succeed");

    assert!(view.validated_at.is_none());
    assert!(view.columns.is_none());

    views::mark_view_validated(
        &pool,
        "tenant-a",
        view.id,
        serde_json::json!([{"name": "id", "data_type": "uuid"}]),
    )
    .await
    .expect("mark_view_validated should succeed");

    let validated = views::get_view(&pool, "tenant-a", view.id).await.unwrap().unwrap();
    assert!(validated.validated_at.is_some());
    assert!(validated.columns.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn update_view_definition_clears_validation() {
    let (pool, db_name) = create_test_db().await;

    let ds = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "source",
        DatasourceType::Postgresql,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    let view = views::insert_view(&pool, "tenant-a", "v", ds.id, serde_json::json!({}))
        .await
        .unwrap();

    views::mark_view_validated(&pool, "tenant-a", view.id, serde_json::json!([]))
        .await
        .unwrap();

    views::update_view_definition(&pool, "tenant-a", view.id, serde_json::json!({"table": "new"}))
        .await
        .expect("update_view_definition should succeed");

    let updated = views::get_view(&pool, "tenant-a", view.id).await.unwrap().unwrap();
    assert!(updated.validated_at.is_none());
    assert!(updated.columns.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn get_view_returns_none_for_missing_id() {
    let (pool, db_name) = create_test_db().await;

    let result = views::get_view(&pool, "tenant-a", Uuid::new_v4()).await.unwrap();
    assert!(result.is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
