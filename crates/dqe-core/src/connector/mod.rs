//! The datasource connector abstraction.
//!
//! Every dialect -- SQL, lakehouse, or object-storage -- implements the same
//! [`Connector`] trait. Lakehouse and object-storage connectors return
//! [`Error::Unsupported`] for `query`; callers must check [`Connector::kind`]
//! before relying on it.

pub mod factory;
pub mod lakehouse;
pub mod object_store;
pub mod registry;
pub mod sql;

use async_trait::async_trait;
use dqe_db::models::DatasourceType;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single scalar value materialized out of a driver-specific row type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl Value {
    /// Best-effort conversion to `f64`, used by aggregate-metric checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Best-effort conversion to a display string, used by `custom_sql`.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

/// A query result: `columns` gives the declared projection order, and each
/// row in `rows` holds one value per column in that same order. Rows are
/// positional rather than name-keyed because driver-generated column names
/// are not guaranteed unique -- `SELECT COUNT(*), COUNT(DISTINCT x)` names
/// both columns `count` in PostgreSQL, and a name-keyed row would silently
/// collapse the two into one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

impl QueryResult {
    /// Looks up a value in `row` by column name, resolving to the first
    /// column with that name. Intended for metadata queries (`list_tables`,
    /// `list_columns`) where the connector controls the projection and
    /// names are known to be unique; check execution reads aggregate
    /// columns positionally instead, since those names can collide.
    pub fn get<'a>(&self, row: &'a [Value], name: &str) -> Option<&'a Value> {
        let index = self.columns.iter().position(|c| c == name)?;
        row.get(index)
    }
}

/// One table or view discovered via `list_tables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub kind: TableKind,
    pub row_count: Option<i64>,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Table,
    View,
    MaterializedView,
    ExternalFile,
}

/// One column discovered via `list_columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// The uniform capability contract every connector exposes.
///
/// Implementations must be usable from many concurrently-running check
/// executions against the same datasource -- the underlying driver pool is
/// responsible for serializing physical connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The dialect this connector was constructed for.
    fn kind(&self) -> DatasourceType;

    /// Open the underlying connection/pool. Called once at construction
    /// time by the registry, before `ping`.
    async fn connect(&self) -> Result<()>;

    /// Verify the connection is live. Called immediately after `connect`
    /// during datasource creation; a failure aborts the create.
    async fn ping(&self) -> Result<()>;

    /// Close the underlying connection/pool. Called by `delete_datasource`.
    async fn close(&self) -> Result<()>;

    /// Run a parameterized query and materialize the result.
    ///
    /// `params` are positional; the connector substitutes its dialect's
    /// placeholder style and never interpolates them into SQL text.
    /// Lakehouse connectors return [`crate::error::Error::Unsupported`].
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// List tables and views visible to this connection.
    async fn list_tables(&self) -> Result<Vec<TableInfo>>;

    /// List columns for one table, in declaration order.
    async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Row count for one table. Connectors that can answer this without a
    /// full scan (object-storage file metadata, `pg_stat`) should prefer
    /// that path; the default expectation is an exact `COUNT(*)`.
    async fn row_count(&self, table: &str) -> Result<i64>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Connector) {}
};
