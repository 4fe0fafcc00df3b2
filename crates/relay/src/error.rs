//! Error types for the relay.

use thiserror::Error;

/// Main error type for relay operations.
///
/// The command handler surfaces every variant to the caller the same way (its `Display`
/// text); the variants only exist to make logs and the CLI more useful.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration errors (invalid URL, unusable credential)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport errors (connect failures, non-2xx responses, broken streams)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol errors (handshake failures, unexpected or malformed JSON-RPC messages)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The tool ran and reported failure (`isError: true` or a JSON-RPC error)
    #[error("Tool error: {0}")]
    Tool(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
