//! Error types for the Tuya cloud client.

use std::time::Duration;

use thiserror::Error;

/// Provider code reported when the access token is no longer accepted.
pub const TOKEN_INVALID_CODE: i64 = 1010;

/// Error type for every client-facing operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or malformed client configuration. Not retryable.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The token endpoint refused to issue a credential or answered with a
    /// result that could not be read.
    #[error("authentication failed: {message}")]
    Authentication { code: Option<i64>, message: String },

    /// The provider rejected the access token (code 1010). The cached
    /// credential has already been dropped, so a new request re-authenticates.
    #[error("access token rejected (code {code}): {message}")]
    TokenInvalid { code: i64, message: String },

    /// The provider answered with an error envelope.
    #[error("remote API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// Input rejected before any network call was made.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Non-success HTTP status whose body was not an error envelope.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or per-call timeout failure in the HTTP stack.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A caller-level deadline elapsed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    /// Provider error code carried by this error, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            ClientError::Authentication { code, .. } => *code,
            ClientError::TokenInvalid { code, .. } | ClientError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether issuing the same top-level request again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::TokenInvalid { .. } | ClientError::Network(_) | ClientError::Timeout(_) => {
                true
            }
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        ClientError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
