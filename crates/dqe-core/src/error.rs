use thiserror::Error;

/// Error kinds surfaced by the core.
///
/// Each variant maps to an HTTP status at the server boundary; that mapping
/// lives in `dqe-server`, not here, so this crate stays transport-agnostic.
#[derive(Debug, Error)]
pub enum Error {
    /// Resource missing. Maps to HTTP 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// Structural or semantic validation failure (bad cron, empty view
    /// definition, unknown operator, unsupported datasource type). Maps to
    /// HTTP 400.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Operation not applicable to this datasource type (e.g. `query` on a
    /// lakehouse connector). Maps to HTTP 400.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Connect/ping/query failure at the driver. Maps to HTTP 500, except
    /// during `test_connection` where it becomes a body-level
    /// `{success: false, error}` at HTTP 200.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Caller or scheduler canceled the operation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Alert channel dispatch failure. Recorded in `AlertHistory`, never
    /// propagated as a request error.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Catch-all for errors that do not need a dedicated kind -- database
    /// errors, I/O, and anything else bubbling up from a library.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("row not found".to_owned()),
            other => Error::ConnectionFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
