//! Layered error definitions
//!
//! Categorized by stage: config / decode / sink

use thiserror::Error;

/// Startup and configuration errors
///
/// These are the only process-fatal errors in loxprox.
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Decode-time errors
///
/// All variants are non-fatal: the offending datagram is dropped and the
/// receive loop continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Datagram is not `<timestamp>;<source>;<data>`
    #[error("malformed frame: {message}")]
    MalformedFrame { message: String },

    /// No decoder registered for the data prefix
    #[error("unknown device type in '{data}'")]
    UnknownDeviceType { data: String },

    /// Prefix is known but the id or tail does not match the device format
    #[error("malformed '{device_type}' payload: {message}")]
    MalformedPayload {
        device_type: String,
        message: String,
    },

    /// A decoded component is outside its valid range
    #[error("{field}={value} out of range [{min}, {max}]")]
    ValueOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl DecodeError {
    /// Create malformed frame error
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Create malformed payload error
    pub fn malformed_payload(device_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            device_type: device_type.into(),
            message: message.into(),
        }
    }

    /// Stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFrame { .. } => "malformed_frame",
            Self::UnknownDeviceType { .. } => "unknown_device_type",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::ValueOutOfRange { .. } => "value_out_of_range",
        }
    }
}

/// Delivery-time errors
///
/// Reported and counted by the dispatcher, never retried by it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The sink attempted delivery and it failed
    #[error("sink '{sink_name}' delivery failed: {message}")]
    DeliveryFailed { sink_name: String, message: String },

    /// The sink transport is down; the event was not queued
    #[error("sink '{sink_name}' not connected")]
    NotConnected { sink_name: String },
}

impl SinkError {
    /// Create delivery failure error
    pub fn delivery_failed(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create not connected error
    pub fn not_connected(sink_name: impl Into<String>) -> Self {
        Self::NotConnected {
            sink_name: sink_name.into(),
        }
    }

    /// Stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::NotConnected { .. } => "not_connected",
        }
    }
}
