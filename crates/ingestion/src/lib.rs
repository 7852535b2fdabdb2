//! # Ingestion Pipeline
//!
//! Inbound side of loxprox.
//!
//! Responsibilities:
//! - Receive UDP datagrams on every configured port (with optional echo)
//! - Split payloads into `RawFrame`s (`FrameDecoder`)
//! - Decode frames into typed `DeviceEvent`s (`DeviceHandlerRegistry`)
//! - Count and log every decode failure without stopping the loop
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, ListenerConfig, UdpListener};
//!
//! let handle = UdpListener::bind(ListenerConfig::default()).await?.start();
//! let pipeline = IngestionPipeline::default();
//!
//! let rx = handle.receiver();
//! while let Ok(datagram) = rx.recv().await {
//!     if let Ok(event) = pipeline.process_datagram(&datagram) {
//!         // hand the event to the dispatcher
//!     }
//! }
//! ```

mod config;
mod decoders;
mod error;
mod frame;
mod listener;
mod pipeline;
mod registry;

// Re-exports
pub use config::{IngestionMetrics, ListenerConfig, MetricsSnapshot};
pub use contracts::{DeviceEvent, RawFrame};
pub use decoders::{decode_ph, decode_pm};
pub use error::{IngestionError, RegistryError, Result};
pub use frame::FrameDecoder;
pub use listener::{Datagram, ListenerHandle, UdpListener};
pub use pipeline::IngestionPipeline;
pub use registry::{Decoder, DeviceHandlerRegistry};
