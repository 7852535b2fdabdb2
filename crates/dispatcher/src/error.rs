//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// Only raised while building outputs at startup. Per-event delivery
/// failures are `contracts::SinkError` and never leave the sink worker.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Two outputs share a name
    #[error("duplicate sink name '{0}'")]
    DuplicateSink(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors returned by a light bridge call
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Transport failure or timeout
    #[error("bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("bridge answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The bridge accepted the request but reported an error entry
    #[error("bridge rejected command: {0}")]
    Rejected(String),
}
