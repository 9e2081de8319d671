//! HTTP-layer integration tests: exercise the full router with
//! `tower::ServiceExt::oneshot`, against an ephemeral per-test Postgres
//! database (no real socket).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sqlx::PgPool;
use tower::ServiceExt;

use dqe_db::models::DatasourceType;
use dqe_server::config::EngineConfig;
use dqe_server::AppState;
use dqe_test_utils::{create_test_db, drop_test_db, pg_url};

const TENANT: &str = "acme";
const TOKEN: &str = "test-bearer-token";

fn test_config() -> EngineConfig {
    static INIT: std::sync::Once = std::sync::Once::new();
    // All tests want the same token value, so setting it more than once
    // (even concurrently) is harmless.
    INIT.call_once(|| unsafe { std::env::set_var("DQE_API_TOKEN", TOKEN) });
    EngineConfig::resolve(Some("postgresql://unused/unused"), Some("127.0.0.1:0"))
}

async fn send(pool: PgPool, method: &str, uri: &str, body: Option<serde_json::Value>) -> axum::response::Response {
    let state = AppState::new(pool, test_config());
    let app = dqe_server::build_router(state);

    let mut builder = Request::builder().method(method).uri(uri).header("Authorization", format!("Bearer {TOKEN}")).header("X-Tenant", TENANT);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1_048_576).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A connection spec that actually resolves to the test's own ephemeral
/// database, so datasource creation exercises a real `connect`+`ping`.
async fn self_referential_connection(db_name: &str) -> serde_json::Value {
    let base = pg_url().await;
    let rest = base.strip_prefix("postgresql://").expect("pg_url should be a postgresql:// URL");
    let (userinfo, hostport) = rest.split_once('@').expect("pg_url should carry userinfo");
    let (user, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
    let (host, port) = hostport.split_once(':').unwrap_or((hostport, "5432"));

    serde_json::json!({
        "host": host,
        "port": port.parse::<u16>().unwrap_or(5432),
        "database": db_name,
        "user": user,
        "password": password,
    })
}

#[tokio::test]
async fn health_reports_ok() {
    let (pool, db_name) = create_test_db().await;

    let resp = send(pool.clone(), "GET", "/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let (pool, db_name) = create_test_db().await;

    let state = AppState::new(pool.clone(), test_config());
    let app = dqe_server::build_router(state);
    let resp = app
        .oneshot(Request::builder().uri("/api/v1/datasources").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn datasource_create_connects_before_persisting() {
    let (pool, db_name) = create_test_db().await;
    let connection = self_referential_connection(&db_name).await;

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/datasources",
        Some(serde_json::json!({
            "name": "warehouse",
            "datasource_type": "postgresql",
            "connection": connection,
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    assert_eq!(json["name"], "warehouse");
    let id = json["id"].as_str().unwrap();

    let resp = send(pool.clone(), "GET", &format!("/api/v1/datasources/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn datasource_create_rejects_bad_connection_without_persisting() {
    let (pool, db_name) = create_test_db().await;

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/datasources",
        Some(serde_json::json!({
            "name": "unreachable",
            "datasource_type": "postgresql",
            "connection": {
                "host": "127.0.0.1",
                "port": 1,
                "database": "nope",
                "user": "nope",
                "password": "nope",
            },
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = send(pool.clone(), "GET", "/api/v1/datasources", None).await;
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 0, "failed creation must not persist a row");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn datasource_test_endpoint_never_propagates_connection_failure() {
    let (pool, db_name) = create_test_db().await;

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/datasources/test",
        Some(serde_json::json!({
            "name": "scratch",
            "datasource_type": "postgresql",
            "connection": {
                "host": "127.0.0.1",
                "port": 1,
                "database": "nope",
                "user": "nope",
                "password": "nope",
            },
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK, "connection failures surface as a body, not an HTTP error");
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn check_crud_roundtrip() {
    let (pool, db_name) = create_test_db().await;
    let ds_id = dqe_db::queries::datasources::insert_datasource(&pool, TENANT, "source", DatasourceType::Postgresql, serde_json::json!({}))
        .await
        .unwrap()
        .id;

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/checks",
        Some(serde_json::json!({
            "name": "orders_not_null",
            "datasource_id": ds_id,
            "check_type": "null_check",
            "table_name": "orders",
            "column_name": "customer_id",
            "parameters": {},
            "threshold": {"type": "absolute", "value": 0.0},
            "severity": "high",
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    let id = created["id"].as_str().unwrap();

    let resp = send(pool.clone(), "GET", &format!("/api/v1/datasources/{ds_id}/checks"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list = body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let resp = send(pool.clone(), "DELETE", &format!("/api/v1/checks/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(pool.clone(), "GET", &format!("/api/v1/checks/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn schedule_crud_roundtrip() {
    let (pool, db_name) = create_test_db().await;

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/schedules",
        Some(serde_json::json!({
            "name": "nightly",
            "cron_expression": "0 0 * * *",
            "timezone": "UTC",
            "check_ids": [],
            "channel_ids": [],
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert!(created["next_run_at"].is_string(), "a valid cron expression should resolve a next fire time");
    let id = created["id"].as_str().unwrap();

    let resp = send(pool.clone(), "GET", &format!("/api/v1/schedules/{id}/executions"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 0);

    let resp = send(
        pool.clone(),
        "PUT",
        &format!("/api/v1/schedules/{id}"),
        Some(serde_json::json!({
            "cron_expression": "garbage cron",
            "timezone": "UTC",
            "check_ids": [],
            "channel_ids": [],
            "active": true,
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "an invalid cron expression must be rejected");

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn view_sql_and_validate_roundtrip() {
    let (pool, db_name) = create_test_db().await;
    let connection = self_referential_connection(&db_name).await;
    let ds_resp = send(
        pool.clone(),
        "POST",
        "/api/v1/datasources",
        Some(serde_json::json!({
            "name": "warehouse",
            "datasource_type": "postgresql",
            "connection": connection,
        })),
    )
    .await;
    let ds_id = body_json(ds_resp).await["id"].as_str().unwrap().to_owned();

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/views",
        Some(serde_json::json!({
            "name": "active_orders",
            "datasource_id": ds_id,
            "definition": {"sql": "SELECT 1 AS id"},
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_str().unwrap().to_owned();

    let resp = send(pool.clone(), "GET", &format!("/api/v1/views/{id}/sql"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["sql"], "SELECT 1 AS id");

    let resp = send(pool.clone(), "POST", &format!("/api/v1/views/{id}/validate"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["valid"], true);
    assert!(json["columns"].as_array().is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn alert_channel_crud_and_empty_history() {
    let (pool, db_name) = create_test_db().await;

    let resp = send(
        pool.clone(),
        "POST",
        "/api/v1/alerts/channels",
        Some(serde_json::json!({
            "name": "oncall-slack",
            "channel_type": "webhook",
            "configuration": {"url": "https://example.invalid/hook"},
            "min_severity": "high",
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["id"].as_str().unwrap().to_owned();

    let resp = send(pool.clone(), "GET", &format!("/api/v1/alerts/history?channel_id={id}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

