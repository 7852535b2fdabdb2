//! Sink trait - OutputManager delivery interface
//!
//! Defines the abstract interface for concrete outputs.

use crate::{DeviceEvent, SinkError};

/// Successful delivery outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The sink acted on the event
    Delivered,
    /// The sink has nothing to do for this payload kind
    Ignored,
}

/// Event delivery trait
///
/// All sink implementations must implement this trait. Each call is one
/// best-effort delivery attempt; retrying is the sink's own concern.
#[trait_variant::make(Sink: Send)]
pub trait LocalSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one event
    ///
    /// # Errors
    /// `DeliveryFailed` when the attempt failed, `NotConnected` when the
    /// transport is down. Neither is fatal to the caller.
    async fn send(&mut self, event: &DeviceEvent) -> Result<Ack, SinkError>;

    /// Release the transport
    async fn close(&mut self) -> Result<(), SinkError>;
}
