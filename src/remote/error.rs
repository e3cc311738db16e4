//! Classification of failures surfaced by the remote platform.

use std::time::Duration;

/// A remote call failure, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The caller's capability grant does not cover the call.
    #[error("missing permission: {0}")]
    PermissionDenied(String),

    /// The platform rejected the request as malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The platform throttled the call.
    #[error("rate limited")]
    RateLimited {
        /// Server-provided wait before retrying.
        retry_after: Option<Duration>,
    },

    /// The addressed entity does not exist.
    #[error("unknown entity: {0}")]
    NotFound(String),

    /// Any other failure (network, 5xx, timeouts).
    #[error("remote failure: {0}")]
    Unknown(String),
}

impl RemoteError {
    /// Returns `true` if retrying the same call can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::PermissionDenied(_) | Self::Validation(_))
    }
}
