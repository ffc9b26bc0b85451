//! ARM client error types.

use thiserror::Error;

/// ARM client errors.
#[derive(Error, Debug)]
pub enum ArmError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ARM returned a non-success status
    #[error("ARM error {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected resource
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Endpoint is not a valid URL
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("configuration error: {0}")]
    InvalidConfig(String),
}

impl ArmError {
    /// The resource does not exist at the provider scope.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Worth retrying later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for ARM operations.
pub type ArmResult<T> = Result<T, ArmError>;
