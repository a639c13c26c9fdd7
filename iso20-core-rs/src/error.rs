//! Error types for the session engine
//!
//! Protocol-level failures (unknown session, sequence errors, rejected
//! parameters) are never errors here: they become response codes sent to
//! the EV. Only framing defects and collaborator failures escape `poll()`.

use thiserror::Error;

/// Errors raised by the session engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid V2GTP header: {0}")]
    InvalidHeader(String),

    #[error("payload too long: {length} bytes (capacity {capacity})")]
    PayloadTooLong { length: usize, capacity: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("feedback callback failed: {0}")]
    Feedback(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("connection is not open")]
    NotConnected,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
