//! Backend error types.

use thiserror::Error;

/// Errors that can occur when talking to the examprep backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (missing or invalid API token).
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The requested test does not exist.
    #[error("test not found: {0}")]
    TestNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),
}

impl BackendError {
    /// Errors that will not go away by asking again.
    pub fn is_permanent(&self) -> bool {
        match self {
            BackendError::Unauthorized(_) | BackendError::TestNotFound(_) => true,
            BackendError::Api { status, .. } => (400..500).contains(status) && *status != 408,
            BackendError::RateLimited { .. }
            | BackendError::Timeout(_)
            | BackendError::Network(_) => false,
        }
    }

    /// Server-provided delay before the next attempt, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            BackendError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
