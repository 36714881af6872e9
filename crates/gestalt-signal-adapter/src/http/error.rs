/*
[INPUT]:  Error sources (HTTP, API, serialization, auth, WebSocket, filesystem)
[OUTPUT]: Structured error types with retry and auth hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the Gestalt adapter
#[derive(Error, Debug)]
pub enum GestaltError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Challenge or signature verification was rejected
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Signature was valid but the wallet is not on the access list
    #[error("Address {address} is not whitelisted")]
    NotWhitelisted { address: String },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection timeout
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },
}

impl GestaltError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GestaltError::Http(_)
                | GestaltError::Timeout { .. }
                | GestaltError::WebSocket(_)
                | GestaltError::InvalidResponse(_)
        ) || matches!(self, GestaltError::Api { code, .. } if *code >= 500)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            GestaltError::Authentication { .. } | GestaltError::NotWhitelisted { .. }
        )
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        GestaltError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Result type alias for Gestalt operations
pub type Result<T> = std::result::Result<T, GestaltError>;
