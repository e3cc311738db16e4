//! Vault error types with HTTP status code mapping.
//!
//! [`BackupError`] is the central error type for the crate. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! Failures reported by the remote platform arrive as
//! [`RemoteError`](crate::remote::RemoteError) and are folded into the
//! matching top-level variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::remote::RemoteError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "not found: snapshot 42",
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
    /// Numeric error code (see [`BackupError::error_code`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Crate-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Request/Access  | 400 Bad Request / 403        |
/// | 2000–2999 | Not Found       | 404 Not Found                |
/// | 3000–3999 | Server/Upstream | 500 / 502                    |
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Snapshot or remote entity is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller lacks the capability grant for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed request or snapshot data.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The remote platform throttled the call.
    #[error("rate limited; retry after {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the caller may retry.
        retry_after_ms: u64,
    },

    /// A retried remote call failed on every attempt.
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The failure of the final attempt.
        #[source]
        source: RemoteError,
    },

    /// Restore or clear was invoked without a target workspace.
    #[error("invalid target: no workspace supplied")]
    InvalidTarget,

    /// Snapshot store failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unclassified remote failure surfaced at stage level.
    #[error("remote error: {0}")]
    Remote(RemoteError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BackupError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::InvalidTarget => 1002,
            Self::PermissionDenied(_) => 1003,
            Self::NotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::RetriesExhausted { .. } => 3002,
            Self::Serialization(_) => 3003,
            Self::Remote(_) => 3004,
            Self::RateLimited { .. } => 429,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidTarget => StatusCode::BAD_REQUEST,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::RetriesExhausted { .. } | Self::Remote(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RemoteError> for BackupError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            RemoteError::Validation(msg) => Self::Validation(msg),
            RemoteError::NotFound(msg) => Self::NotFound(msg),
            RemoteError::RateLimited { retry_after } => Self::RateLimited {
                retry_after_ms: retry_after
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or(0),
            },
            other @ RemoteError::Unknown(_) => Self::Remote(other),
        }
    }
}

impl IntoResponse for BackupError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            Self::RetriesExhausted { source, .. } => Some(source.to_string()),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
