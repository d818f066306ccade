//! Client error types.

use thiserror::Error;

/// Client error type.
///
/// Cancellation is not an error: a cancelled stream returns
/// [`StreamOutcome::Cancelled`](crate::StreamOutcome::Cancelled).
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server rejected the request before a task was created.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error code from server, e.g. `INVALID_REQUEST`.
        code: String,
        /// Error message from server.
        message: String,
    },

    /// The event stream broke off mid-response.
    #[error("Stream error: {0}")]
    Stream(String),
}

impl ClientError {
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, ClientError::Api { code, .. } if code == "INVALID_REQUEST")
    }

    pub fn is_config_error(&self) -> bool {
        matches!(self, ClientError::Api { code, .. } if code == "CONFIG_ERROR")
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status >= 500)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
