use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// The HTTP-facing error type. Wraps a [`dqe_core::Error`] or an ad hoc
/// message with the status code §7 of the engine design assigns it.
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<dqe_core::error::Error> for AppError {
    fn from(err: dqe_core::error::Error) -> Self {
        use dqe_core::error::Error as CoreError;
        let status = match &err {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            CoreError::Unsupported(_) => StatusCode::BAD_REQUEST,
            CoreError::ConnectionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Cancelled(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::DeliveryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{err:#}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
