//! Error types and handling
//!
//! Common error types used across the relay.

use thiserror::Error;

/// Relay-wide error type
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transport connect failed: {0}")]
    TransportConnect(String),

    #[error("Failed to open outbound stream: {0}")]
    StreamOpen(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Relay already started")]
    AlreadyStarted,

    #[error("Relay is not active")]
    NotActive,

    #[error("No recorded data available")]
    NoDataAvailable,

    #[error("Teardown error: {0}")]
    Teardown(String),
}

impl RelayError {
    /// Stable error code, suitable for surfacing to an embedding frontend.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::TransportConnect(_) => "TRANSPORT_CONNECT_ERROR",
            RelayError::StreamOpen(_) => "STREAM_OPEN_ERROR",
            RelayError::Write(_) => "WRITE_ERROR",
            RelayError::Recorder(_) => "RECORDER_ERROR",
            RelayError::AlreadyStarted => "ALREADY_STARTED",
            RelayError::NotActive => "NOT_ACTIVE",
            RelayError::NoDataAvailable => "NO_DATA_AVAILABLE",
            RelayError::Teardown(_) => "TEARDOWN_ERROR",
        }
    }
}

/// Result type alias using RelayError
pub type RelayResult<T> = Result<T, RelayError>;
