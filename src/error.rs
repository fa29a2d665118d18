use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error")]
    Validation(Vec<String>),

    #[error("failed dependency: {0}")]
    FailedDependency(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg })),
            Self::Conflict(msg) => (StatusCode::CONFLICT, serde_json::json!({ "error": msg })),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "validation error", "fields": errors }),
            ),
            Self::FailedDependency(msg) => (
                StatusCode::FAILED_DEPENDENCY,
                serde_json::json!({ "error": msg }),
            ),
            Self::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "error": msg }),
            ),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource not found".into()),
            sqlx::Error::Database(db_err) => {
                // SQLite extended result codes for UNIQUE violations
                if matches!(db_err.code().as_deref(), Some("2067" | "1555")) {
                    Self::Conflict("resource already exists".into())
                } else {
                    tracing::error!(error = %err, "database error");
                    Self::Internal(err.into())
                }
            }
            _ => {
                tracing::error!(error = %err, "database error");
                Self::Internal(err.into())
            }
        }
    }
}

impl From<fred::error::Error> for ApiError {
    fn from(err: fred::error::Error) -> Self {
        use fred::error::ErrorKind;

        match err.kind() {
            // Transport-class failures: the target database is unreachable
            // or rejected the connection. Surfaced as 424.
            ErrorKind::IO
            | ErrorKind::Timeout
            | ErrorKind::Canceled
            | ErrorKind::Tls
            | ErrorKind::Auth
            | ErrorKind::Config
            | ErrorKind::Url => Self::FailedDependency(format!("redis connection failed: {err}")),
            // Everything else is a command-level error reply (WRONGTYPE,
            // wrong arity, ...) and is the caller's fault.
            _ => Self::BadRequest(format!("redis error: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn fred_io_error_maps_to_failed_dependency() {
        let err = fred::error::Error::new(fred::error::ErrorKind::IO, "connection refused");
        let api: ApiError = err.into();
        assert!(matches!(api, ApiError::FailedDependency(_)));
    }

    #[test]
    fn fred_command_error_maps_to_bad_request() {
        let err = fred::error::Error::new(
            fred::error::ErrorKind::Unknown,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        );
        let api: ApiError = err.into();
        assert!(matches!(api, ApiError::BadRequest(ref msg) if msg.contains("WRONGTYPE")));
    }
}
