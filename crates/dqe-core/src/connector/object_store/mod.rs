//! Object-storage connectors (S3, GCS, Azure Blob, local filesystem).
//!
//! A "table" is a top-level prefix (folder); "columns" and "row count" are
//! inferred per-format from the first object found under that prefix
//!. `query` is always [`Error::Unsupported`] -- there is no query
//! engine here, only file listing and format sniffing.

pub mod azure;
pub mod format;
pub mod gcs;
pub mod local;
pub mod s3;

use crate::error::{Error, Result};

pub fn unsupported_query(dialect: &str) -> Result<crate::connector::QueryResult> {
    Err(Error::Unsupported(format!("{dialect} is a file-listing object-storage connector; direct query is not supported")))
}

/// One object found by a listing call, uniform across providers.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size_bytes: i64,
}
