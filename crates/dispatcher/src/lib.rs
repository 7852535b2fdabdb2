//! # Dispatcher
//!
//! Outbound side of loxprox.
//!
//! Responsibilities:
//! - Resolve the routing table (device type -> sink names)
//! - Fan each decoded event out to its routed sinks
//! - Isolate slow or failing sinks behind bounded per-sink queues
//! - Keep the broker session alive with a two-speed reconnect backoff

pub mod error;
pub mod handle;
pub mod manager;
pub mod metrics;
pub mod resilient;
pub mod routing;
pub mod sinks;

pub use contracts::{Ack, DeviceEvent, Sink, SinkError};
pub use error::{BridgeError, DispatcherError};
pub use handle::SinkHandle;
pub use manager::{create_output_manager, DeliveryReport, OutputManager, OutputManagerBuilder};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use resilient::{
    client_identity, BackoffPolicy, BrokerTransport, ConnectionState, ResilientConnection,
    TransportEvent,
};
pub use routing::RoutingTable;
pub use sinks::{BridgeSink, BrokerSink, HueHttpBridge, LightBridge, LightCommand, MetricsSink};
