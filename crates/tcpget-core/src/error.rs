//! Error types for the TCP GET client
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for TCP GET operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the TCP GET client
#[derive(Error, Debug)]
pub enum Error {
    /// Host name could not be resolved within the configured number of tries
    #[error("DNS resolution of {hostname} failed after {attempts} attempt(s)")]
    DnsResolutionFailed {
        /// Host name that was being resolved
        hostname: String,
        /// Number of attempts made
        attempts: u16,
    },

    /// No reply terminator was seen before the reply timer expired
    #[error("Reply timed out")]
    ReplyTimeout,

    /// TCP connect failed
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Sending the request failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// A named field was not found in the last reply
    #[error("Field not found: {0}")]
    FieldMissing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Acquisition requested before any address was resolved
    #[error("No resolved address available")]
    NotResolved,

    /// Acquisition is already running
    #[error("Data acquisition already running")]
    AlreadyRunning,

    /// Rendered request does not fit the request buffer
    #[error("Request of {len} bytes exceeds buffer capacity of {capacity} bytes")]
    RequestTooLarge {
        /// Rendered request length
        len: usize,
        /// Configured buffer capacity
        capacity: usize,
    },

    /// Transport collaborator errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Resolver collaborator errors
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a "field missing" error
    pub fn field_missing(name: impl Into<String>) -> Self {
        Self::FieldMissing(name.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
