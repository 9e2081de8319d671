//! Integration tests for schedule, schedule-execution, and alert-channel
//! CRUD operations.

use dqe_db::models::{AlertChannelType, AlertOutcome, DatasourceType, ScheduleExecutionStatus, Severity};
use dqe_db::queries::{alert_channels, alert_history, datasources, schedule_executions, schedules};

use dqe_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn insert_and_get_schedule() {
    let (pool, db_name) = create_test_db().await;

    let schedule = schedules::insert_schedule(
        &pool,
        "tenant-a",
        "nightly",
        "0 0 * * *",
        "UTC",
        &[],
        None,
        &[],
        None,
    )
    .await
    .expect("insert_schedule should succeed");

    assert_eq!(schedule.cron_expression, "0 0 * * *");
    assert!(schedule.active);
    assert!(schedule.last_run_at.is_none());

    let fetched = schedules::get_schedule(&pool, "tenant-a", schedule.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.id, schedule.id);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn list_all_active_schedules_crosses_tenants() {
    let (pool, db_name) = create_test_db().await;

    schedules::insert_schedule(&pool, "tenant-a", "s1", "0 * * * *", "UTC", &[], None, &[], None)
        .await
        .unwrap();
    schedules::insert_schedule(&pool, "tenant-b", "s2", "0 * * * *", "UTC", &[], None, &[], None)
        .await
        .unwrap();

    let all_active = schedules::list_all_active_schedules(&pool).await.unwrap();
    assert_eq!(all_active.len(), 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn record_schedule_fire_updates_timestamps() {
    let (pool, db_name) = create_test_db().await;

    let schedule = schedules::insert_schedule(
        &pool,
        "tenant-a",
        "hourly",
        "0 * * * *",
        "UTC",
        &[],
        None,
        &[],
        None,
    )
    .await
    .unwrap();

    let next = chrono::Utc::now() + chrono::Duration::hours(1);
    schedules::record_schedule_fire(&pool, schedule.id, Some(next))
        .await
        .expect("record_schedule_fire should succeed");

    let updated = schedules::get_schedule(&pool, "tenant-a", schedule.id)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.last_run_at.is_some());
    assert!(updated.next_run_at.is_some());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn schedule_execution_lifecycle() {
    let (pool, db_name) = create_test_db().await;

    let schedule = schedules::insert_schedule(
        &pool,
        "tenant-a",
        "lifecycle",
        "0 * * * *",
        "UTC",
        &[],
        None,
        &[],
        None,
    )
    .await
    .unwrap();

    let execution = schedule_executions::start_execution(&pool, schedule.id)
        .await
        .expect("start_execution should succeed");
    assert_eq!(execution.status, ScheduleExecutionStatus::Running);
    assert!(execution.completed_at.is_none());

    schedule_executions::complete_execution(
        &pool,
        execution.id,
        ScheduleExecutionStatus::Completed,
        1200,
        serde_json::json!({"total_checks": 3, "passed": 3, "failed": 0}),
        0,
        None,
    )
    .await
    .expect("complete_execution should succeed");

    let completed = schedule_executions::get_execution(&pool, execution.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completed.status, ScheduleExecutionStatus::Completed);
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.duration_ms, Some(1200));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn reset_orphaned_executions_marks_running_as_failed() {
    let (pool, db_name) = create_test_db().await;

    let schedule = schedules::insert_schedule(
        &pool,
        "tenant-a",
        "orphan-test",
        "0 * * * *",
        "UTC",
        &[],
        None,
        &[],
        None,
    )
    .await
    .unwrap();

    let execution = schedule_executions::start_execution(&pool, schedule.id).await.unwrap();

    let reset = schedule_executions::reset_orphaned_executions(&pool)
        .await
        .expect("reset_orphaned_executions should succeed");
    assert_eq!(reset.len(), 1);
    assert_eq!(reset[0].id, execution.id);
    assert_eq!(reset[0].status, ScheduleExecutionStatus::Failed);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn alert_channel_and_history_roundtrip() {
    let (pool, db_name) = create_test_db().await;

    let _ds = datasources::insert_datasource(
        &pool,
        "tenant-a",
        "source",
        DatasourceType::Postgresql,
        serde_json::json!({}),
    )
    .await
    .unwrap();

    let channel = alert_channels::insert_alert_channel(
        &pool,
        "tenant-a",
        "oncall-slack",
        AlertChannelType::Slack,
        serde_json::json!({"webhook_url": "https://hooks.slack.example/abc"}),
        Severity::Medium,
    )
    .await
    .expect("insert_alert_channel should succeed");

    alert_history::insert_alert_history(&pool, channel.id, None, AlertOutcome::Sent, None)
        .await
        .expect("insert_alert_history should succeed");

    alert_history::insert_alert_history(
        &pool,
        channel.id,
        None,
        AlertOutcome::Failed,
        Some("connection refused"),
    )
    .await
    .unwrap();

    let history = alert_history::list_history_for_channel(&pool, channel.id, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].outcome, AlertOutcome::Failed, "newest first");

    pool.close().await;
    drop_test_db(&db_name).await;
}
