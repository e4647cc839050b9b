//! Error types for model providers.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur while talking to an embedding or generation provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider could not be reached.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish within its deadline.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The requested model is not installed.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            Self::ModelNotFound(_) | Self::InvalidResponse(_) | Self::Serialization(_) => false,
        }
    }
}
