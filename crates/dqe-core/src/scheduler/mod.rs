//! The scheduler: one supervised task per active schedule, cron-driven,
//! cancellation-aware, with serialized executions per schedule and
//! parallel executions across schedules.

pub mod cron_util;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;
use dqe_db::models::{Check, CheckStatus, Schedule, ScheduleExecution, ScheduleExecutionStatus, Severity};
use dqe_db::queries::{check_results, checks, schedule_executions, schedules, views};
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::alert::{self, AlertPayload};
use crate::connector::registry::ConnectorRegistry;
use crate::connector::sql::validate_table_ident;
use crate::error::{Error, Result};
use crate::view::ViewDefinition;

struct RunningSchedule {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

/// Owns one cooperative task per active schedule. The schedule map is a
/// single coarse lock; readers copy out references rather than holding the
/// lock across an await.
pub struct Scheduler {
    pool: PgPool,
    registry: Arc<ConnectorRegistry>,
    running: RwLock<HashMap<Uuid, RunningSchedule>>,
}

impl Scheduler {
    pub fn new(pool: PgPool, registry: Arc<ConnectorRegistry>) -> Self {
        Self {
            pool,
            registry,
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Starts one task per currently-active schedule and resets any
    /// execution left `running` by a prior process crash.
    pub async fn start(&self) -> Result<()> {
        let orphaned = schedule_executions::reset_orphaned_executions(&self.pool).await?;
        for execution in &orphaned {
            tracing::warn!(execution_id = %execution.id, schedule_id = %execution.schedule_id, "reset orphaned schedule execution to failed");
        }

        let active = schedules::list_all_active_schedules(&self.pool).await?;
        for schedule in active {
            self.spawn(schedule).await;
        }
        Ok(())
    }

    /// Spawns (or respawns) the supervised task for one schedule.
    pub async fn spawn(&self, schedule: Schedule) {
        let schedule_id = schedule.id;
        let cancel = CancellationToken::new();
        let pool = self.pool.clone();
        let registry = self.registry.clone();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            run_schedule_loop(pool, registry, schedule, task_cancel).await;
        });

        let mut running = self.running.write().await;
        if let Some(previous) = running.insert(schedule_id, RunningSchedule { cancel, join }) {
            previous.cancel.cancel();
        }
    }

    /// Cancels a schedule's task, propagating cancellation to any in-flight
    /// execution. Used by `delete_schedule` and deactivation.
    pub async fn cancel(&self, schedule_id: Uuid) {
        let handle = self.running.write().await.remove(&schedule_id);
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let _ = handle.join.await;
        }
    }

    /// Cancels every running task and waits for drain.
    pub async fn stop(&self) {
        let handles: Vec<RunningSchedule> = self.running.write().await.drain().map(|(_, v)| v).collect();
        for handle in &handles {
            handle.cancel.cancel();
        }
        for handle in handles {
            let _ = handle.join.await;
        }
    }

    /// Synchronous manual fire: bypasses the sleep and returns the
    /// completed execution.
    pub async fn run_now(&self, schedule_id: Uuid, tenant_id: &str) -> Result<ScheduleExecution> {
        let schedule = schedules::get_schedule(&self.pool, tenant_id, schedule_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("schedule {schedule_id} not found")))?;
        fire(&self.pool, &self.registry, &schedule, CancellationToken::new()).await
    }

    /// Number of schedules with a currently-running supervisor task.
    pub async fn active_count(&self) -> usize {
        self.running.read().await.len()
    }
}

async fn run_schedule_loop(pool: PgPool, registry: Arc<ConnectorRegistry>, mut schedule: Schedule, cancel: CancellationToken) {
    loop {
        let next = match cron_util::next_fire(&schedule.cron_expression, &schedule.timezone, Utc::now()) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(schedule_id = %schedule.id, error = %e, "schedule has an invalid cron expression, stopping task");
                return;
            }
        };

        let sleep_for = (next - Utc::now()).to_std().unwrap_or(StdDuration::ZERO);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(schedule_id = %schedule.id, "schedule task cancelled while sleeping");
                return;
            }
            _ = tokio::time::sleep(sleep_for) => {}
        }

        match fire(&pool, &registry, &schedule, cancel.clone()).await {
            Ok(execution) => {
                tracing::info!(schedule_id = %schedule.id, execution_id = %execution.id, status = %execution.status, "schedule fired");
            }
            Err(e) => {
                tracing::error!(schedule_id = %schedule.id, error = %e, "schedule firing failed");
            }
        }

        // The schedule may have been edited or deactivated between firings.
        // Deactivation/deletion stops the task; an edit picks up the new
        // cron/timezone/membership on the next loop iteration.
        match schedules::get_schedule(&pool, &schedule.tenant_id, schedule.id).await {
            Ok(Some(fresh)) if fresh.active => schedule = fresh,
            Ok(_) => {
                tracing::info!(schedule_id = %schedule.id, "schedule no longer active, stopping task");
                return;
            }
            Err(e) => {
                tracing::error!(schedule_id = %schedule.id, error = %e, "failed to reload schedule, stopping task");
                return;
            }
        }
    }
}

/// One firing: resolves the check list, runs each serially, records the
/// execution, and dispatches alerts if any check failed.
async fn fire(pool: &PgPool, registry: &ConnectorRegistry, schedule: &Schedule, cancel: CancellationToken) -> Result<ScheduleExecution> {
    let execution = schedule_executions::start_execution(pool, schedule.id).await?;
    let started = Instant::now();

    let check_list = resolve_checks(pool, schedule).await;
    let check_list = match check_list {
        Ok(list) => list,
        Err(e) => {
            let duration_ms = started.elapsed().as_millis() as i64;
            schedule_executions::complete_execution(
                pool,
                execution.id,
                ScheduleExecutionStatus::Failed,
                duration_ms,
                json!({"total_checks": 0}),
                0,
                Some(&e.to_string()),
            )
            .await?;
            return schedule_executions::get_execution(pool, execution.id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("execution {} vanished", execution.id)));
        }
    };

    let mut counts: HashMap<CheckStatus, i64> = HashMap::new();
    let mut any_error = false;

    for check in &check_list {
        if cancel.is_cancelled() {
            record_result(pool, &execution, check, cancelled_outcome()).await?;
            *counts.entry(CheckStatus::Error).or_insert(0) += 1;
            any_error = true;
            continue;
        }

        let outcome = run_one_check(pool, registry, check, &cancel).await;
        if outcome.status == CheckStatus::Error {
            any_error = true;
        }
        *counts.entry(outcome.status).or_insert(0) += 1;
        record_result(pool, &execution, check, outcome).await?;
    }

    let total_checks: i64 = counts.values().sum();
    let failed_checks = counts.get(&CheckStatus::Failed).copied().unwrap_or(0);
    let summary = json!({
        "total_checks": total_checks,
        "passed": counts.get(&CheckStatus::Passed).copied().unwrap_or(0),
        "failed_checks": failed_checks,
        "warning": counts.get(&CheckStatus::Warning).copied().unwrap_or(0),
        "error": counts.get(&CheckStatus::Error).copied().unwrap_or(0),
        "skipped": counts.get(&CheckStatus::Skipped).copied().unwrap_or(0),
    });

    let status = if any_error { ScheduleExecutionStatus::Partial } else { ScheduleExecutionStatus::Completed };

    let alerts_sent = if failed_checks > 0 {
        let alert = AlertPayload {
            id: execution.id,
            severity: Severity::High,
            title: format!("Schedule {:?} has {failed_checks} failing check(s)", schedule.name),
            summary: format!("{failed_checks} of {total_checks} checks failed in this execution."),
        };
        match alert::dispatch(pool, &schedule.tenant_id, &schedule.channel_ids, Some(execution.id), &alert).await {
            Ok(outcomes) => outcomes.len() as i32,
            Err(e) => {
                tracing::error!(schedule_id = %schedule.id, error = %e, "alert dispatch failed");
                0
            }
        }
    } else {
        0
    };

    let duration_ms = started.elapsed().as_millis() as i64;
    schedule_executions::complete_execution(pool, execution.id, status, duration_ms, summary, alerts_sent, None).await?;
    schedules::record_schedule_fire(pool, schedule.id, next_run_after(schedule)).await?;

    schedule_executions::get_execution(pool, execution.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("execution {} vanished", execution.id)))
}

fn next_run_after(schedule: &Schedule) -> Option<chrono::DateTime<Utc>> {
    cron_util::next_fire(&schedule.cron_expression, &schedule.timezone, Utc::now()).ok()
}

async fn resolve_checks(pool: &PgPool, schedule: &Schedule) -> Result<Vec<Check>> {
    if let Some(datasource_id) = schedule.datasource_id {
        checks::list_active_checks_for_datasource(pool, &schedule.tenant_id, datasource_id).await.map_err(Into::into)
    } else {
        checks::get_checks_by_ids(pool, &schedule.tenant_id, &schedule.check_ids).await.map_err(Into::into)
    }
}

fn cancelled_outcome() -> crate::check::CheckOutcome {
    crate::check::CheckOutcome {
        status: CheckStatus::Error,
        actual_value: None,
        expected_value: None,
        message: "check execution was cancelled".to_owned(),
        details: json!({}),
        duration_ms: 0,
        error: Some("cancelled".to_owned()),
    }
}

async fn run_one_check(pool: &PgPool, registry: &ConnectorRegistry, check: &Check, cancel: &CancellationToken) -> crate::check::CheckOutcome {
    let connector = match registry.get(check.datasource_id).await {
        Ok(c) => c,
        Err(e) => {
            return crate::check::CheckOutcome {
                status: CheckStatus::Error,
                actual_value: None,
                expected_value: None,
                message: "datasource connector not registered".to_owned(),
                details: json!({}),
                duration_ms: 0,
                error: Some(e.to_string()),
            };
        }
    };

    let target = match resolve_target(pool, check).await {
        Ok(t) => t,
        Err(e) => {
            return crate::check::CheckOutcome {
                status: CheckStatus::Error,
                actual_value: None,
                expected_value: None,
                message: "could not resolve check target".to_owned(),
                details: json!({}),
                duration_ms: 0,
                error: Some(e.to_string()),
            };
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => cancelled_outcome(),
        outcome = crate::check::execute(connector.as_ref(), check, &target) => outcome,
    }
}

/// Resolves a check's query target: the view's compiled SQL wrapped as a
/// subquery when `view_id` is set, or the bare table name otherwise.
async fn resolve_target(pool: &PgPool, check: &Check) -> Result<String> {
    if let Some(view_id) = check.view_id {
        let view = views::get_view(pool, &check.tenant_id, view_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("view {view_id} not found")))?;
        let definition: ViewDefinition = serde_json::from_value(view.definition)
            .map_err(|e| Error::Invalid(format!("stored view definition is malformed: {e}")))?;
        definition.as_target()
    } else {
        validate_table_ident(&check.table_name)?;
        Ok(check.table_name.clone())
    }
}

async fn record_result(pool: &PgPool, execution: &ScheduleExecution, check: &Check, outcome: crate::check::CheckOutcome) -> Result<()> {
    check_results::insert_check_result(
        pool,
        check.id,
        Some(execution.id),
        outcome.status,
        outcome.actual_value,
        outcome.expected_value.as_deref(),
        Some(&outcome.message),
        outcome.details,
        outcome.duration_ms,
        outcome.error.as_deref(),
    )
    .await?;
    checks::record_check_run(pool, check.id, outcome.status).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_outcome_is_error_status() {
        let outcome = cancelled_outcome();
        assert_eq!(outcome.status, CheckStatus::Error);
        assert!(outcome.error.is_some());
    }
}
