//! Error types for the Slack transport.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlackError {
    /// A required request header is absent or not valid UTF-8
    #[error("missing or invalid header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid request timestamp")]
    InvalidTimestamp,

    /// Timestamp outside the accepted window (replay protection)
    #[error("request timestamp is too old or too far in the future")]
    StaleTimestamp,

    #[error("invalid request signature")]
    InvalidSignature,

    /// `response_url` host is not in the allowed set
    #[error("reply host not allowed: {0}")]
    ReplyHostRejected(String),

    /// Reply could not be delivered
    #[error("reply delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, SlackError>;
