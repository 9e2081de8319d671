//! Integration tests for check and check-result CRUD operations.

use dqe_db::models::{CheckStatus, CheckType, DatasourceType, Severity};
use dqe_db::queries::{check_results, checks, datasources};

use dqe_test_utils::{create_test_db, drop_test_db};

async fn make_datasource(pool: &sqlx::PgPool) -> uuid::Uuid {
    datasources::insert_datasource(
        pool,
        "tenant-a",
        "source",
        DatasourceType::Postgresql,
        serde_json::json!({}),
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn insert_and_get_check() {
    let (pool, db_name) = create_test_db().await;
    let ds_id = make_datasource(&pool).await;

    let check = checks::insert_check(
        &pool,
        "tenant-a",
        "orders_not_null",
        ds_id,
        None,
        CheckType::NullCheck,
        "orders",
        Some("customer_id"),
        serde_json::json!({}),
        serde_json::json!({"type": "absolute", "value": 0.0}),
        Severity::High,
        &["pii".to_string()],
    )
    .await
    .expect("insert_check should succeed");

    assert_eq!(check.name, "orders_not_null");
    assert_eq!(check.check_type, CheckType::NullCheck);
    assert_eq!(check.severity, Severity::High);
    assert!(check.last_run_at.is_none());
    assert!(check.last_status.is_none());

    let fetched = checks::get_check(&pool, "tenant-a", check.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, check.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_checks_filters_by_severity() {
    let (pool, db_name) = create_test_db().await;
    let ds_id = make_datasource(&pool).await;

    checks::insert_check(
        &pool,
        "tenant-a",
        "high-sev",
        ds_id,
        None,
        CheckType::RowCount,
        "orders",
        None,
        serde_json::json!({}),
        serde_json::json!({"type": "absolute", "value": 1.0}),
        Severity::Critical,
        &[],
    )
    .await
    .unwrap();

    checks::insert_check(
        &pool,
        "tenant-a",
        "low-sev",
        ds_id,
        None,
        CheckType::RowCount,
        "orders",
        None,
        serde_json::json!({}),
        serde_json::json!({"type": "absolute", "value": 1.0}),
        Severity::Info,
        &[],
    )
    .await
    .unwrap();

    let critical_only = checks::list_checks(&pool, "tenant-a", None, Some(Severity::Critical))
        .await
        .unwrap();
    assert_eq!(critical_only.len(), 1);
    assert_eq!(critical_only[0].name, "high-sev");

    let all = checks::list_checks(&pool, "tenant-a", None, None).await.unwrap();
    assert_eq!(all.len(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn record_check_run_updates_denormalized_fields() {
    let (pool, db_name) = create_test_db().await;
    let ds_id = make_datasource(&pool).await;

    let check = checks::insert_check(
        &pool,
        "tenant-a",
        "freshness",
        ds_id,
        None,
        CheckType::Freshness,
        "events",
        Some("occurred_at"),
        serde_json::json!({"max_age_seconds": 3600}),
        serde_json::json!({"type": "absolute", "value": 3600.0}),
        Severity::Medium,
        &[],
    )
    .await
    .unwrap();

    checks::record_check_run(&pool, check.id, CheckStatus::Passed)
        .await
        .expect("record_check_run should succeed");

    let updated = checks::get_check(&pool, "tenant-a", check.id).await.unwrap().unwrap();
    assert!(updated.last_run_at.is_some());
    assert_eq!(updated.last_status, Some(CheckStatus::Passed));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn check_results_are_append_only_and_ordered() {
    let (pool, db_name) = create_test_db().await;
    let ds_id = make_datasource(&pool).await;

    let check = checks::insert_check(
        &pool,
        "tenant-a",
        "row-count",
        ds_id,
        None,
        CheckType::RowCount,
        "orders",
        None,
        serde_json::json!({}),
        serde_json::json!({"type": "absolute", "value": 1.0}),
        Severity::Low,
        &[],
    )
    .await
    .unwrap();

    for i in 0..3 {
        check_results::insert_check_result(
            &pool,
            check.id,
            None,
            CheckStatus::Passed,
            Some(100.0 + i as f64),
            None,
            Some("ok"),
            serde_json::json!({}),
            10,
            None,
        )
        .await
        .unwrap();
    }

    let results = check_results::list_results_for_check(&pool, check.id, 10).await.unwrap();
    assert_eq!(results.len(), 3);

    let latest = check_results::latest_result_for_check(&pool, check.id)
        .await
        .unwrap()
        .expect("latest result should exist");
    assert_eq!(latest.actual_value, Some(102.0));

    pool.close().await;
    drop_test_db(&db_name).await;
}
