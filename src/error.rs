//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the error type returned by services and handlers. Each
//! variant maps to a specific HTTP status code and a structured JSON error
//! response. Storage errors are translated through `From<StoreError>`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::persistence::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "restaurants not found: 0192…",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 5000–5999 | Availability    | 503 Service Unavailable      |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A list filter was unknown or mistyped.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The acting user header is missing or empty.
    #[error("missing or empty X-User-Id header")]
    MissingActor,

    /// Requested record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Table or resource name.
        resource: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// The change conflicts with stored data or a concurrent change.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The backing store is temporarily unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidFilter(_) => 1002,
            Self::MissingActor => 1003,
            Self::NotFound { .. } => 2001,
            Self::Conflict(_) => 2002,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::Unavailable(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidFilter(_) | Self::MissingActor => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns `true` if the client may retry the same request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { table, id } => Self::NotFound {
                resource: table,
                id,
            },
            StoreError::InvalidFilter { .. } => Self::InvalidFilter(err.to_string()),
            StoreError::IntegrityViolation(_) | StoreError::TransactionConflict(_) => {
                Self::Conflict(err.to_string())
            }
            StoreError::PoolExhausted { .. }
            | StoreError::ConnectionLost(_)
            | StoreError::PoolClosed
            | StoreError::PoolUninitialized => Self::Unavailable(err.to_string()),
            StoreError::ArchiveWriteFailed { .. }
            | StoreError::CorruptRow(_)
            | StoreError::Serialization(_)
            | StoreError::Database(_) => Self::PersistenceError(err.to_string()),
            StoreError::PoolAlreadyInitialized
            | StoreError::UnitOfWorkMisuse(_)
            | StoreError::Config(_) => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.is_retryable().then(|| "retryable".to_string()),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses() {
        let cases = [
            (ApiError::InvalidRequest("x".into()), 1001, StatusCode::BAD_REQUEST),
            (ApiError::MissingActor, 1003, StatusCode::BAD_REQUEST),
            (
                ApiError::NotFound {
                    resource: "restaurants",
                    id: "1".into(),
                },
                2001,
                StatusCode::NOT_FOUND,
            ),
            (ApiError::Conflict("x".into()), 2002, StatusCode::CONFLICT),
            (
                ApiError::PersistenceError("x".into()),
                3001,
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Unavailable("x".into()),
                5001,
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.error_code(), code);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn store_errors_map_by_intent() {
        assert!(matches!(
            ApiError::from(StoreError::PoolExhausted { waited_ms: 5 }),
            ApiError::Unavailable(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::IntegrityViolation("fk".into())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::NotFound {
                table: "reviews",
                id: "r1".into()
            }),
            ApiError::NotFound {
                resource: "reviews",
                ..
            }
        ));
        assert!(matches!(
            ApiError::from(StoreError::InvalidFilter {
                table: "restaurants",
                key: "colour".into(),
                reason: "unknown".into()
            }),
            ApiError::InvalidFilter(_)
        ));
        assert!(matches!(
            ApiError::from(StoreError::UnitOfWorkMisuse("x")),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn response_has_status_and_retry_hint() {
        let response = ApiError::Unavailable("pool exhausted".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
