//! Lakehouse connectors (HDFS, Delta Lake, Iceberg, Hudi): catalog-backed
//! table formats that expose the same [`Connector`](crate::connector::Connector)
//! capability set as the SQL dialects but answer metadata through a catalog
//! engine rather than a driver connection. Direct `query` always fails with
//! [`Error::Unsupported`] -- callers must route ad hoc SQL through a
//! [`View`](dqe_db::models::View) against a SQL-family datasource instead.

pub mod delta;
pub mod hdfs;
pub mod hudi;
pub mod iceberg;

use crate::error::{Error, Result};

/// Shared guard every lakehouse connector's `query` implementation calls
/// first; centralizes the wording so the four dialects read identically.
pub fn unsupported_query(dialect: &str) -> Result<crate::connector::QueryResult> {
    Err(Error::Unsupported(format!(
        "{dialect} is a catalog-backed lakehouse connector; direct query is not supported -- \
         define a view against a SQL-family datasource instead"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_query_names_the_dialect() {
        let err = unsupported_query("Delta Lake").unwrap_err();
        assert!(err.to_string().contains("Delta Lake"));
    }
}
