//! Error types for the canvas client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Socket could not be opened or was lost
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Frame that could not be encoded or decoded
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP transport failure or unexpected response
    #[error("HTTP error: {0}")]
    Http(String),

    /// Placement rejected by the server
    #[error("Placement rejected ({code}): {message}")]
    Placement {
        status: u16,
        code: String,
        message: String,
        retry_after_ms: Option<i64>,
    },

    /// Reconnection gave up
    #[error("Gave up reconnecting after {0} attempts")]
    RetriesExhausted(u32),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        ClientError::Http(error.to_string())
    }
}
