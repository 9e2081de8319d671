use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The dialect a datasource speaks. Closed enumeration -- the connector
/// registry dispatches on this field to select an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DatasourceType {
    Postgresql,
    Mysql,
    SqlServer,
    Oracle,
    Snowflake,
    Databricks,
    Bigquery,
    Trino,
    Duckdb,
    Clickhouse,
    Hdfs,
    DeltaLake,
    Iceberg,
    Hudi,
    S3,
    Gcs,
    AzureBlob,
    LocalFilesystem,
}

impl DatasourceType {
    /// Whether this type belongs to the lakehouse family (catalog-backed,
    /// `query` unsupported).
    pub fn is_lakehouse(self) -> bool {
        matches!(self, Self::Hdfs | Self::DeltaLake | Self::Iceberg | Self::Hudi)
    }

    /// Whether this type belongs to the object-storage family.
    pub fn is_object_store(self) -> bool {
        matches!(self, Self::S3 | Self::Gcs | Self::AzureBlob | Self::LocalFilesystem)
    }

    /// Whether this is a SQL-family dialect with a direct `query` capability.
    pub fn is_sql_family(self) -> bool {
        !self.is_lakehouse() && !self.is_object_store()
    }
}

impl fmt::Display for DatasourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Postgresql => "postgresql",
            Self::Mysql => "mysql",
            Self::SqlServer => "sql_server",
            Self::Oracle => "oracle",
            Self::Snowflake => "snowflake",
            Self::Databricks => "databricks",
            Self::Bigquery => "bigquery",
            Self::Trino => "trino",
            Self::Duckdb => "duckdb",
            Self::Clickhouse => "clickhouse",
            Self::Hdfs => "hdfs",
            Self::DeltaLake => "delta_lake",
            Self::Iceberg => "iceberg",
            Self::Hudi => "hudi",
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::AzureBlob => "azure_blob",
            Self::LocalFilesystem => "local_filesystem",
        };
        f.write_str(s)
    }
}

impl FromStr for DatasourceType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgresql" => Ok(Self::Postgresql),
            "mysql" => Ok(Self::Mysql),
            "sql_server" => Ok(Self::SqlServer),
            "oracle" => Ok(Self::Oracle),
            "snowflake" => Ok(Self::Snowflake),
            "databricks" => Ok(Self::Databricks),
            "bigquery" => Ok(Self::Bigquery),
            "trino" => Ok(Self::Trino),
            "duckdb" => Ok(Self::Duckdb),
            "clickhouse" => Ok(Self::Clickhouse),
            "hdfs" => Ok(Self::Hdfs),
            "delta_lake" => Ok(Self::DeltaLake),
            "iceberg" => Ok(Self::Iceberg),
            "hudi" => Ok(Self::Hudi),
            "s3" => Ok(Self::S3),
            "gcs" => Ok(Self::Gcs),
            "azure_blob" => Ok(Self::AzureBlob),
            "local_filesystem" => Ok(Self::LocalFilesystem),
            other => Err(ParseEnumError::new("datasource type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// The kind of probe a check performs. Dispatches the synthesis routine in
/// the check executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    RowCount,
    NullCheck,
    Uniqueness,
    Freshness,
    MinValue,
    MaxValue,
    MeanValue,
    SumValue,
    Regex,
    Range,
    SetMembership,
    ReferentialIntegrity,
    SchemaMatch,
    CustomSql,
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RowCount => "row_count",
            Self::NullCheck => "null_check",
            Self::Uniqueness => "uniqueness",
            Self::Freshness => "freshness",
            Self::MinValue => "min_value",
            Self::MaxValue => "max_value",
            Self::MeanValue => "mean_value",
            Self::SumValue => "sum_value",
            Self::Regex => "regex",
            Self::Range => "range",
            Self::SetMembership => "set_membership",
            Self::ReferentialIntegrity => "referential_integrity",
            Self::SchemaMatch => "schema_match",
            Self::CustomSql => "custom_sql",
        };
        f.write_str(s)
    }
}

impl FromStr for CheckType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "row_count" => Ok(Self::RowCount),
            "null_check" => Ok(Self::NullCheck),
            "uniqueness" => Ok(Self::Uniqueness),
            "freshness" => Ok(Self::Freshness),
            "min_value" => Ok(Self::MinValue),
            "max_value" => Ok(Self::MaxValue),
            "mean_value" => Ok(Self::MeanValue),
            "sum_value" => Ok(Self::SumValue),
            "regex" => Ok(Self::Regex),
            "range" => Ok(Self::Range),
            "set_membership" => Ok(Self::SetMembership),
            "referential_integrity" => Ok(Self::ReferentialIntegrity),
            "schema_match" => Ok(Self::SchemaMatch),
            "custom_sql" => Ok(Self::CustomSql),
            other => Err(ParseEnumError::new("check type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Outcome status of a single check execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Warning,
    Error,
    Skipped,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

impl FromStr for CheckStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "skipped" => Ok(Self::Skipped),
            other => Err(ParseEnumError::new("check status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// How a check's actual value is compared against its configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    Absolute,
    Percentage,
    Range,
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absolute => "absolute",
            Self::Percentage => "percentage",
            Self::Range => "range",
        };
        f.write_str(s)
    }
}

impl FromStr for ThresholdType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(Self::Absolute),
            "percentage" => Ok(Self::Percentage),
            "range" => Ok(Self::Range),
            other => Err(ParseEnumError::new("threshold type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Severity, with a total order `Critical > High > Medium > Low > Info`.
///
/// Declaration order is ascending so the derived [`Ord`] implementation
/// matches that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(ParseEnumError::new("severity", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Status of one schedule firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleExecutionStatus {
    Running,
    Completed,
    Failed,
    Partial,
}

impl fmt::Display for ScheduleExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
        };
        f.write_str(s)
    }
}

impl FromStr for ScheduleExecutionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "partial" => Ok(Self::Partial),
            other => Err(ParseEnumError::new("schedule execution status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Delivery mechanism for an alert channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertChannelType {
    Email,
    Slack,
    Webhook,
    Pagerduty,
    Msteams,
    Opsgenie,
}

impl fmt::Display for AlertChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::Webhook => "webhook",
            Self::Pagerduty => "pagerduty",
            Self::Msteams => "msteams",
            Self::Opsgenie => "opsgenie",
        };
        f.write_str(s)
    }
}

impl FromStr for AlertChannelType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "slack" => Ok(Self::Slack),
            "webhook" => Ok(Self::Webhook),
            "pagerduty" => Ok(Self::Pagerduty),
            "msteams" => Ok(Self::Msteams),
            "opsgenie" => Ok(Self::Opsgenie),
            other => Err(ParseEnumError::new("alert channel type", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Outcome of a single alert delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    Sent,
    Failed,
}

impl fmt::Display for AlertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for AlertOutcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError::new("alert outcome", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Error returned when parsing an invalid enum string. Shared across every
/// enum in this module to avoid a fresh error type per variant set.
#[derive(Debug, Clone)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A named connection spec for one backing store (Datasource).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Datasource {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub datasource_type: DatasourceType,
    pub connection: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A logical query bound to one datasource (View).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct View {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub datasource_id: Uuid,
    /// Serialized [`dqe_core::view::ViewDefinition`].
    pub definition: serde_json::Value,
    pub validated_at: Option<DateTime<Utc>>,
    pub columns: Option<serde_json::Value>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named data-quality probe (Check).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Check {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub datasource_id: Uuid,
    pub view_id: Option<Uuid>,
    pub check_type: CheckType,
    pub table_name: String,
    pub column_name: Option<String>,
    /// Serialized [`dqe_core::check::CheckParameters`].
    pub parameters: serde_json::Value,
    /// Serialized [`dqe_core::check::Threshold`].
    pub threshold: serde_json::Value,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<CheckStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One execution outcome for a check (CheckResult). Immutable once
/// written; append-only, keyed by `check_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckResult {
    pub id: Uuid,
    pub check_id: Uuid,
    pub schedule_execution_id: Option<Uuid>,
    pub status: CheckStatus,
    pub actual_value: Option<f64>,
    pub expected_value: Option<String>,
    pub message: Option<String>,
    pub details: serde_json::Value,
    pub duration_ms: i64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

/// A cron-driven execution plan (Schedule).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub cron_expression: String,
    pub timezone: String,
    pub check_ids: Vec<Uuid>,
    pub datasource_id: Option<Uuid>,
    pub channel_ids: Vec<Uuid>,
    pub active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One firing of a schedule (ScheduleExecution). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleExecution {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub status: ScheduleExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    /// Counts per [`CheckStatus`] plus `total_checks`/`failed_checks`.
    pub summary: serde_json::Value,
    pub alerts_sent: i32,
    pub error: Option<String>,
}

/// A delivery endpoint for failure notifications (AlertChannel).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertChannel {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub channel_type: AlertChannelType,
    pub configuration: serde_json::Value,
    pub min_severity: Severity,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A delivery record (AlertHistory). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertHistory {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub schedule_execution_id: Option<Uuid>,
    pub outcome: AlertOutcome,
    pub sent_at: DateTime<Utc>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datasource_type_display_roundtrip() {
        let variants = [
            DatasourceType::Postgresql,
            DatasourceType::Mysql,
            DatasourceType::SqlServer,
            DatasourceType::Oracle,
            DatasourceType::Snowflake,
            DatasourceType::Databricks,
            DatasourceType::Bigquery,
            DatasourceType::Trino,
            DatasourceType::Duckdb,
            DatasourceType::Clickhouse,
            DatasourceType::Hdfs,
            DatasourceType::DeltaLake,
            DatasourceType::Iceberg,
            DatasourceType::Hudi,
            DatasourceType::S3,
            DatasourceType::Gcs,
            DatasourceType::AzureBlob,
            DatasourceType::LocalFilesystem,
        ];
        for v in variants {
            let s = v.to_string();
            let parsed: DatasourceType = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn datasource_type_family_classification() {
        assert!(DatasourceType::Postgresql.is_sql_family());
        assert!(!DatasourceType::Postgresql.is_lakehouse());
        assert!(DatasourceType::Iceberg.is_lakehouse());
        assert!(!DatasourceType::Iceberg.is_sql_family());
        assert!(DatasourceType::S3.is_object_store());
        assert!(!DatasourceType::S3.is_sql_family());
    }

    #[test]
    fn datasource_type_invalid() {
        assert!("bogus".parse::<DatasourceType>().is_err());
    }

    #[test]
    fn check_type_display_roundtrip() {
        let variants = [
            CheckType::RowCount,
            CheckType::NullCheck,
            CheckType::Uniqueness,
            CheckType::Freshness,
            CheckType::MinValue,
            CheckType::MaxValue,
            CheckType::MeanValue,
            CheckType::SumValue,
            CheckType::Regex,
            CheckType::Range,
            CheckType::SetMembership,
            CheckType::ReferentialIntegrity,
            CheckType::SchemaMatch,
            CheckType::CustomSql,
        ];
        for v in variants {
            let s = v.to_string();
            let parsed: CheckType = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn check_status_display_roundtrip() {
        let variants = [
            CheckStatus::Pending,
            CheckStatus::Running,
            CheckStatus::Passed,
            CheckStatus::Failed,
            CheckStatus::Warning,
            CheckStatus::Error,
            CheckStatus::Skipped,
        ];
        for v in variants {
            let s = v.to_string();
            let parsed: CheckStatus = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn severity_total_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn severity_display_roundtrip() {
        for v in [
            Severity::Info,
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let s = v.to_string();
            let parsed: Severity = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn schedule_execution_status_display_roundtrip() {
        for v in [
            ScheduleExecutionStatus::Running,
            ScheduleExecutionStatus::Completed,
            ScheduleExecutionStatus::Failed,
            ScheduleExecutionStatus::Partial,
        ] {
            let s = v.to_string();
            let parsed: ScheduleExecutionStatus = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn alert_channel_type_display_roundtrip() {
        for v in [
            AlertChannelType::Email,
            AlertChannelType::Slack,
            AlertChannelType::Webhook,
            AlertChannelType::Pagerduty,
            AlertChannelType::Msteams,
            AlertChannelType::Opsgenie,
        ] {
            let s = v.to_string();
            let parsed: AlertChannelType = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn alert_outcome_display_roundtrip() {
        for v in [AlertOutcome::Sent, AlertOutcome::Failed] {
            let s = v.to_string();
            let parsed: AlertOutcome = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }

    #[test]
    fn threshold_type_display_roundtrip() {
        for v in [ThresholdType::Absolute, ThresholdType::Percentage, ThresholdType::Range] {
            let s = v.to_string();
            let parsed: ThresholdType = s.parse().expect("should parse");
            assert_eq!(v, parsed);
        }
    }
}
