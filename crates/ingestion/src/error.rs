//! Ingestion error types

use std::net::SocketAddr;

use thiserror::Error;

/// Ingestion errors
///
/// Bind failures are the only process-fatal condition on the inbound side.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Bind address does not parse
    #[error("invalid bind address '{ip}:{port}'")]
    InvalidAddress {
        /// Configured ip
        ip: String,
        /// Configured port
        port: u16,
    },

    /// UDP socket could not be bound
    #[error("failed to bind udp socket {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No ports configured
    #[error("no udp ports configured")]
    NoPorts,
}

/// Decoder registration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Empty prefix
    #[error("device type prefix cannot be empty")]
    EmptyPrefix,

    /// Prefix is not lowercase ASCII letters
    #[error("device type prefix '{prefix}' must be lowercase ascii letters")]
    InvalidPrefix {
        /// Rejected prefix
        prefix: String,
    },

    /// Prefix already registered
    #[error("device type prefix '{prefix}' already registered")]
    Duplicate {
        /// Rejected prefix
        prefix: String,
    },

    /// One prefix is a prefix of the other
    #[error("device type prefix '{prefix}' overlaps registered '{existing}'")]
    Overlapping {
        /// Rejected prefix
        prefix: String,
        /// Already registered prefix
        existing: String,
    },
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
