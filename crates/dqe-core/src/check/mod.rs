//! The check executor: dispatches a [`Check`] to one of fourteen synthesis
//! routines, grades the result against its configured parameters, and
//! returns a gradable outcome for the caller to persist.

pub mod params;

use std::time::Instant;

use dqe_db::models::{Check, CheckStatus, CheckType};
use serde_json::json;

use crate::connector::sql::validate_table_ident;
use crate::connector::{Connector, Value};
use crate::error::{Error, Result};
use params::{
    parse, AggregateValueParams, CustomSqlParams, FreshnessParams, NullCheckParams, RangeParams,
    ReferentialIntegrityParams, RegexParams, RowCountParams, SchemaMatchParams, SetMembershipParams,
    UniquenessParams,
};

/// The graded result of one check run, not yet persisted. The caller
/// (the scheduler, or a synchronous `POST /checks/{id}/run`) writes this
/// into a `CheckResult` row and updates `check.last_run_at`/`last_status`.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub actual_value: Option<f64>,
    pub expected_value: Option<String>,
    pub message: String,
    pub details: serde_json::Value,
    pub duration_ms: i64,
    pub error: Option<String>,
}

impl CheckOutcome {
    fn skipped() -> Self {
        Self {
            status: CheckStatus::Skipped,
            actual_value: None,
            expected_value: None,
            message: "check is inactive".to_owned(),
            details: json!({}),
            duration_ms: 0,
            error: None,
        }
    }

    fn errored(error: &Error) -> Self {
        Self {
            status: CheckStatus::Error,
            actual_value: None,
            expected_value: None,
            message: "check could not be graded".to_owned(),
            details: json!({}),
            duration_ms: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Runs `check` against `connector`. `target` is the table name to query,
/// or a view-backed subquery already wrapped by the caller via
/// [`crate::view::ViewDefinition::as_target`].
///
/// Inactive checks short-circuit to `skipped` without touching the
/// connector.
pub async fn execute(connector: &dyn Connector, check: &Check, target: &str) -> CheckOutcome {
    if !check.active {
        return CheckOutcome::skipped();
    }

    let start = Instant::now();
    let result = dispatch(connector, check, target).await;
    let duration_ms = start.elapsed().as_millis() as i64;

    match result {
        Ok(mut outcome) => {
            outcome.duration_ms = duration_ms;
            outcome
        }
        Err(e) => {
            let mut outcome = CheckOutcome::errored(&e);
            outcome.duration_ms = duration_ms;
            outcome
        }
    }
}

async fn dispatch(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    match check.check_type {
        CheckType::RowCount => row_count(connector, check, target).await,
        CheckType::NullCheck => null_check(connector, check, target).await,
        CheckType::Uniqueness => uniqueness(connector, check, target).await,
        CheckType::Freshness => freshness(connector, check, target).await,
        CheckType::MinValue => aggregate_value(connector, check, target, "MIN").await,
        CheckType::MaxValue => aggregate_value(connector, check, target, "MAX").await,
        CheckType::MeanValue => aggregate_value(connector, check, target, "AVG").await,
        CheckType::SumValue => aggregate_value(connector, check, target, "SUM").await,
        CheckType::Regex => regex_check(connector, check, target).await,
        CheckType::Range => range_check(connector, check, target).await,
        CheckType::SetMembership => set_membership(connector, check, target).await,
        CheckType::ReferentialIntegrity => referential_integrity(connector, check, target).await,
        CheckType::SchemaMatch => schema_match(connector, check).await,
        CheckType::CustomSql => custom_sql(connector, check).await,
    }
}

fn column(check: &Check) -> Result<&str> {
    let column = check
        .column_name
        .as_deref()
        .ok_or_else(|| Error::Invalid(format!("check {:?} requires column_name", check.id)))?;
    validate_table_ident(column)?;
    Ok(column)
}

fn quote(s: &str) -> String {
    format!("'{s}'")
}

/// Looks up the value of the query's `nth` projected column in its first
/// row. Rows are positional, not name-keyed, because aggregate queries like
/// `SELECT COUNT(*), COUNT(DISTINCT x)` can project two columns under the
/// same driver-assigned name.
fn nth_column(result: &crate::connector::QueryResult, index: usize) -> Option<&Value> {
    result.rows.first()?.get(index)
}

/// `(total, matching)` from the first row of a `SELECT COUNT(*), <metric>`
/// style query. Missing values default to `0`, matching the vacuous-pass
/// rule for an empty or error-returning result set.
fn count_pair(result: &crate::connector::QueryResult) -> (i64, i64) {
    let total = nth_column(result, 0).and_then(Value::as_f64).unwrap_or(0.0) as i64;
    let matching = nth_column(result, 1).and_then(Value::as_f64).unwrap_or(0.0) as i64;
    (total, matching)
}

/// The percentage-metric grading rule shared by every check type that
/// computes `matching / total * 100`: `0/0` is a vacuous pass.
fn grade_percentage(total: i64, matching: i64, min_percentage: f64) -> (f64, CheckStatus) {
    if total == 0 {
        return (0.0, CheckStatus::Passed);
    }
    let pct = matching as f64 / total as f64 * 100.0;
    let status = if pct >= min_percentage { CheckStatus::Passed } else { CheckStatus::Failed };
    (pct, status)
}

async fn row_count(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: RowCountParams = parse(check.check_type, &check.parameters)?;
    let count = connector.row_count(target).await?;

    let too_low = p.min_rows.is_some_and(|min| count < min);
    let too_high = p.max_rows.is_some_and(|max| count > max);
    let status = if too_low || too_high { CheckStatus::Failed } else { CheckStatus::Passed };
    let message = if status == CheckStatus::Passed {
        format!("row count {count} is within bounds")
    } else {
        format!("row count {count} is outside bounds [{:?}, {:?}]", p.min_rows, p.max_rows)
    };

    Ok(CheckOutcome {
        status,
        actual_value: Some(count as f64),
        expected_value: None,
        message,
        details: json!({"row_count": count, "min_rows": p.min_rows, "max_rows": p.max_rows}),
        duration_ms: 0,
        error: None,
    })
}

async fn null_check(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: NullCheckParams = parse(check.check_type, &check.parameters)?;
    let col = column(check)?;
    let sql = format!("SELECT COUNT(*), SUM(CASE WHEN {col} IS NULL THEN 1 ELSE 0 END) FROM {target}");
    let result = connector.query(&sql, &[]).await?;
    let (total, null_count) = count_pair(&result);
    let null_pct = if total == 0 { 0.0 } else { null_count as f64 / total as f64 * 100.0 };

    let exceeds_pct = p.max_null_percentage.is_some_and(|max| total > 0 && null_pct > max);
    let exceeds_count = p.max_null_count.is_some_and(|max| null_count > max);
    let status = if total == 0 {
        CheckStatus::Passed
    } else if exceeds_pct || exceeds_count {
        CheckStatus::Failed
    } else {
        CheckStatus::Passed
    };

    Ok(CheckOutcome {
        status,
        actual_value: Some(null_pct),
        expected_value: None,
        message: format!("{null_count} of {total} rows are NULL ({null_pct:.2}%)"),
        details: json!({"null_count": null_count, "total": total, "null_percentage": null_pct}),
        duration_ms: 0,
        error: None,
    })
}

async fn uniqueness(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: UniquenessParams = parse(check.check_type, &check.parameters)?;
    for c in &p.columns {
        validate_table_ident(c)?;
    }
    let cols = p.columns.join(", ");
    let sql = format!("SELECT COUNT(*), COUNT(DISTINCT {cols}) FROM {target}");
    let result = connector.query(&sql, &[]).await?;
    let (total, distinct) = count_pair(&result);
    let (pct, status) = grade_percentage(total, distinct, p.min_percentage);

    Ok(CheckOutcome {
        status,
        actual_value: Some(pct),
        expected_value: None,
        message: format!("{distinct} distinct of {total} rows ({pct:.2}% unique)"),
        details: json!({"total": total, "distinct": distinct, "uniqueness_pct": pct}),
        duration_ms: 0,
        error: None,
    })
}

async fn freshness(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: FreshnessParams = parse(check.check_type, &check.parameters)?;
    validate_table_ident(&p.timestamp_column)?;
    let sql = format!("SELECT MAX({}) FROM {target}", p.timestamp_column);
    let result = connector.query(&sql, &[]).await?;

    let latest = nth_column(&result, 0);
    let age_hours = match latest {
        Some(Value::Timestamp(ts)) => (chrono::Utc::now() - *ts).num_seconds() as f64 / 3600.0,
        Some(Value::Null) | None => return Err(Error::Invalid("freshness check found no rows".to_owned())),
        Some(other) => return Err(Error::Invalid(format!("freshness column did not return a timestamp: {other:?}"))),
    };

    let status = if age_hours > p.max_age_hours { CheckStatus::Failed } else { CheckStatus::Passed };

    Ok(CheckOutcome {
        status,
        actual_value: Some(age_hours),
        expected_value: Some(p.max_age_hours.to_string()),
        message: format!("most recent row is {age_hours:.2} hours old (max {})", p.max_age_hours),
        details: json!({"age_hours": age_hours, "max_age_hours": p.max_age_hours}),
        duration_ms: 0,
        error: None,
    })
}

async fn aggregate_value(connector: &dyn Connector, check: &Check, target: &str, agg: &str) -> Result<CheckOutcome> {
    let p: AggregateValueParams = parse(check.check_type, &check.parameters)?;
    validate_table_ident(&p.column)?;
    let sql = format!("SELECT {agg}({}) FROM {target}", p.column);
    let result = connector.query(&sql, &[]).await?;
    let actual = nth_column(&result, 0)
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::Invalid(format!("{agg} query returned no numeric value")))?;

    let delta = (actual - p.expected).abs();
    let status = if delta > p.tolerance { CheckStatus::Failed } else { CheckStatus::Passed };

    Ok(CheckOutcome {
        status,
        actual_value: Some(actual),
        expected_value: Some(p.expected.to_string()),
        message: format!("{agg}({}) = {actual} (expected {} +/- {})", p.column, p.expected, p.tolerance),
        details: json!({"actual": actual, "expected": p.expected, "tolerance": p.tolerance}),
        duration_ms: 0,
        error: None,
    })
}

async fn regex_check(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: RegexParams = parse(check.check_type, &check.parameters)?;
    let col = column(check)?;
    let sql = format!(
        "SELECT COUNT(*), SUM(CASE WHEN {col} ~ {} THEN 1 ELSE 0 END) FROM {target}",
        quote(&p.pattern)
    );
    let result = connector.query(&sql, &[]).await?;
    let (total, matching) = count_pair(&result);
    let (pct, status) = grade_percentage(total, matching, p.min_match_percentage);

    Ok(CheckOutcome {
        status,
        actual_value: Some(pct),
        expected_value: None,
        message: format!("{matching} of {total} rows match /{}/ ({pct:.2}%)", p.pattern),
        details: json!({"total": total, "matching": matching, "match_pct": pct}),
        duration_ms: 0,
        error: None,
    })
}

async fn range_check(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: RangeParams = parse(check.check_type, &check.parameters)?;
    let col = column(check)?;
    let sql = format!(
        "SELECT COUNT(*), SUM(CASE WHEN {col} BETWEEN {} AND {} THEN 1 ELSE 0 END) FROM {target}",
        p.min, p.max
    );
    let result = connector.query(&sql, &[]).await?;
    let (total, matching) = count_pair(&result);
    let (pct, status) = grade_percentage(total, matching, p.min_percentage);

    Ok(CheckOutcome {
        status,
        actual_value: Some(pct),
        expected_value: None,
        message: format!("{matching} of {total} rows in [{}, {}] ({pct:.2}%)", p.min, p.max),
        details: json!({"total": total, "in_range": matching, "in_range_pct": pct}),
        duration_ms: 0,
        error: None,
    })
}

async fn set_membership(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: SetMembershipParams = parse(check.check_type, &check.parameters)?;
    let col = column(check)?;
    let allowed = p.allowed_values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ");
    let sql = format!("SELECT COUNT(*), SUM(CASE WHEN {col} IN ({allowed}) THEN 1 ELSE 0 END) FROM {target}");
    let result = connector.query(&sql, &[]).await?;
    let (total, matching) = count_pair(&result);
    let (pct, status) = grade_percentage(total, matching, p.min_percentage);

    Ok(CheckOutcome {
        status,
        actual_value: Some(pct),
        expected_value: None,
        message: format!("{matching} of {total} rows have an allowed value ({pct:.2}%)"),
        details: json!({"total": total, "valid": matching, "valid_pct": pct}),
        duration_ms: 0,
        error: None,
    })
}

async fn referential_integrity(connector: &dyn Connector, check: &Check, target: &str) -> Result<CheckOutcome> {
    let p: ReferentialIntegrityParams = parse(check.check_type, &check.parameters)?;
    let col = column(check)?;
    validate_table_ident(&p.reference_table)?;
    validate_table_ident(&p.reference_column)?;
    let sql = format!(
        "SELECT COUNT(*), COUNT(r.{}) FROM {target} t LEFT JOIN {} r ON t.{col} = r.{}",
        p.reference_column, p.reference_table, p.reference_column
    );
    let result = connector.query(&sql, &[]).await?;
    let (total, matching) = count_pair(&result);
    let (pct, status) = grade_percentage(total, matching, p.min_percentage);

    Ok(CheckOutcome {
        status,
        actual_value: Some(pct),
        expected_value: None,
        message: format!("{matching} of {total} rows resolve against {} ({pct:.2}%)", p.reference_table),
        details: json!({"total": total, "resolved": matching, "integrity_pct": pct}),
        duration_ms: 0,
        error: None,
    })
}

async fn schema_match(connector: &dyn Connector, check: &Check) -> Result<CheckOutcome> {
    let p: SchemaMatchParams = parse(check.check_type, &check.parameters)?;
    validate_table_ident(&check.table_name)?;
    let actual_columns = connector.list_columns(&check.table_name).await?;

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();
    for expected in &p.expected_columns {
        match actual_columns.iter().find(|c| c.name == expected.name) {
            None => missing.push(expected.name.clone()),
            Some(actual) if !actual.data_type.eq_ignore_ascii_case(&expected.data_type) => {
                mismatched.push(json!({"column": expected.name, "expected": expected.data_type, "actual": actual.data_type}));
            }
            Some(_) => {}
        }
    }

    let status = if missing.is_empty() && mismatched.is_empty() { CheckStatus::Passed } else { CheckStatus::Failed };
    Ok(CheckOutcome {
        status,
        actual_value: Some(actual_columns.len() as f64),
        expected_value: Some(p.expected_columns.len().to_string()),
        message: if status == CheckStatus::Passed {
            "schema matches".to_owned()
        } else {
            format!("schema mismatch: missing {missing:?}, type mismatches {mismatched:?}")
        },
        details: json!({"missing": missing, "mismatched": mismatched}),
        duration_ms: 0,
        error: None,
    })
}

async fn custom_sql(connector: &dyn Connector, check: &Check) -> Result<CheckOutcome> {
    let p: CustomSqlParams = parse(check.check_type, &check.parameters)?;
    let result = connector.query(&p.sql, &[]).await?;

    let first_value = nth_column(&result, 0);
    let status = match (&p.expected_value, first_value) {
        (Some(expected), Some(actual)) => {
            if &actual.as_display() == expected {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed
            }
        }
        (Some(_), None) => CheckStatus::Failed,
        (None, _) => {
            if result.row_count > 0 {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed
            }
        }
    };

    let actual_display = first_value.map(Value::as_display);
    Ok(CheckOutcome {
        status,
        actual_value: actual_display.as_deref().and_then(|s| s.parse().ok()),
        expected_value: p.expected_value.clone(),
        message: format!(
            "custom_sql returned {:?}, expected {:?}",
            actual_display, p.expected_value
        ),
        details: json!({"row_count": result.row_count}),
        duration_ms: 0,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::QueryResult;

    #[test]
    fn vacuous_pass_on_empty_table() {
        let result = QueryResult {
            columns: vec!["count".to_owned(), "matching".to_owned()],
            rows: vec![vec![Value::Int(0), Value::Int(0)]],
            row_count: 1,
        };
        let (total, matching) = count_pair(&result);
        let (pct, status) = grade_percentage(total, matching, 100.0);
        assert_eq!(pct, 0.0);
        assert_eq!(status, CheckStatus::Passed);
    }

    /// Regression test: PostgreSQL names both aggregates `count` in
    /// `SELECT COUNT(*), COUNT(DISTINCT cols)` (uniqueness) and
    /// `SELECT COUNT(*), COUNT(r.ref_col)` (referential_integrity). A
    /// name-keyed row would collapse these into one entry and make
    /// `count_pair` read `(distinct, distinct)` -- always a 100% pass.
    #[test]
    fn count_pair_reads_positionally_despite_duplicate_column_names() {
        let result = QueryResult {
            columns: vec!["count".to_owned(), "count".to_owned()],
            rows: vec![vec![Value::Int(100), Value::Int(40)]],
            row_count: 1,
        };
        let (total, matching) = count_pair(&result);
        assert_eq!((total, matching), (100, 40));
        let (pct, status) = grade_percentage(total, matching, 90.0);
        assert_eq!(pct, 40.0);
        assert_eq!(status, CheckStatus::Failed);
    }

    #[test]
    fn grade_percentage_fails_below_threshold() {
        let (pct, status) = grade_percentage(100, 50, 90.0);
        assert_eq!(pct, 50.0);
        assert_eq!(status, CheckStatus::Failed);
    }

    #[test]
    fn grade_percentage_passes_at_threshold() {
        let (pct, status) = grade_percentage(100, 90, 90.0);
        assert_eq!(pct, 90.0);
        assert_eq!(status, CheckStatus::Passed);
    }
}
