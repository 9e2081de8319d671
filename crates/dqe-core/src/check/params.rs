//! Type-discriminated parameter bags for each [`CheckType`]. Stored as
//! opaque JSON on the `checks` row; parsed against the shape matching
//! `check.check_type` immediately before dispatch.

use dqe_db::models::CheckType;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RowCountParams {
    #[serde(default)]
    pub min_rows: Option<i64>,
    #[serde(default)]
    pub max_rows: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NullCheckParams {
    #[serde(default)]
    pub max_null_percentage: Option<f64>,
    #[serde(default)]
    pub max_null_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UniquenessParams {
    pub columns: Vec<String>,
    #[serde(default = "default_full_percentage")]
    pub min_percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FreshnessParams {
    pub timestamp_column: String,
    pub max_age_hours: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregateValueParams {
    pub column: String,
    pub expected: f64,
    #[serde(default)]
    pub tolerance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegexParams {
    pub pattern: String,
    #[serde(default = "default_full_percentage")]
    pub min_match_percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RangeParams {
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_full_percentage")]
    pub min_percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetMembershipParams {
    pub allowed_values: Vec<String>,
    #[serde(default = "default_full_percentage")]
    pub min_percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferentialIntegrityParams {
    pub reference_table: String,
    pub reference_column: String,
    #[serde(default = "default_full_percentage")]
    pub min_percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpectedColumn {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaMatchParams {
    pub expected_columns: Vec<ExpectedColumn>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomSqlParams {
    pub sql: String,
    #[serde(default)]
    pub expected_value: Option<String>,
}

fn default_full_percentage() -> f64 {
    100.0
}

/// Parses a check's `parameters` JSON against the shape its `check_type`
/// dictates.
pub fn parse<T: serde::de::DeserializeOwned>(check_type: CheckType, parameters: &serde_json::Value) -> Result<T> {
    serde_json::from_value(parameters.clone())
        .map_err(|e| Error::Invalid(format!("invalid parameters for {check_type}: {e}")))
}
