//! The alert dispatcher: severity-gated, multi-channel fan-out with
//! per-attempt delivery history.

pub mod channels;

use dqe_db::models::{AlertChannel, AlertOutcome, Severity};
use dqe_db::queries::{alert_channels, alert_history};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

/// One alert to fan out to a set of channels. `id` is used as the
/// dedup key for channels (PagerDuty) that need idempotent delivery.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub id: Uuid,
    pub severity: Severity,
    pub title: String,
    pub summary: String,
}

impl AlertPayload {
    /// The synthetic `info`-severity alert sent by `test_channel`.
    pub fn test() -> Self {
        Self {
            id: Uuid::new_v4(),
            severity: Severity::Info,
            title: "Test alert".to_owned(),
            summary: "This is a test alert from the data-quality engine.".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub channel_id: Uuid,
    pub outcome: AlertOutcome,
    pub error: Option<String>,
}

/// Fans `alert` out to every channel in `channel_ids` that is active and
/// whose `min_severity` the alert's severity meets or exceeds. Every
/// attempt -- success or failure -- is recorded in `alert_history`; a
/// single channel's failure never blocks the others.
pub async fn dispatch(
    pool: &PgPool,
    tenant_id: &str,
    channel_ids: &[Uuid],
    schedule_execution_id: Option<Uuid>,
    alert: &AlertPayload,
) -> Result<Vec<DispatchOutcome>> {
    let eligible_channels = alert_channels::get_channels_by_ids(pool, tenant_id, channel_ids).await?;
    let mut outcomes = Vec::with_capacity(eligible_channels.len());

    for channel in eligible_channels {
        if alert.severity < channel.min_severity {
            tracing::debug!(
                channel_id = %channel.id,
                channel_severity = %channel.min_severity,
                alert_severity = %alert.severity,
                "alert severity below channel threshold, skipping"
            );
            continue;
        }

        let send_result = channels::send(&channel, alert).await;
        let (outcome, error) = match &send_result {
            Ok(()) => (AlertOutcome::Sent, None),
            Err(e) => (AlertOutcome::Failed, Some(e.to_string())),
        };

        if let Err(e) = &send_result {
            tracing::warn!(channel_id = %channel.id, channel_type = %channel.channel_type, error = %e, "alert delivery failed");
        }

        alert_history::insert_alert_history(pool, channel.id, schedule_execution_id, outcome, error.as_deref()).await?;
        outcomes.push(DispatchOutcome {
            channel_id: channel.id,
            outcome,
            error,
        });
    }

    Ok(outcomes)
}

/// Sends a synthetic test alert through one channel's dispatch path
/// without recording history (the test-delivery API handler records its
/// own outcome, separate from this dispatch path).
pub async fn test_channel(channel: &AlertChannel) -> Result<()> {
    channels::send(channel, &AlertPayload::test()).await
}

/// `critical > high > medium > low > info`, backed by [`Severity`]'s
/// derived `Ord`.
pub fn meets_threshold(alert_severity: Severity, min_severity: Severity) -> bool {
    alert_severity >= min_severity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_threshold_total_order() {
        assert!(meets_threshold(Severity::Critical, Severity::High));
        assert!(meets_threshold(Severity::High, Severity::High));
        assert!(!meets_threshold(Severity::Medium, Severity::High));
        assert!(meets_threshold(Severity::Info, Severity::Info));
    }
}
