//! Ingestion pipeline: datagram -> RawFrame -> DeviceEvent

use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::{DecodeError, DeviceEvent};
use tracing::{debug, warn};

use crate::config::IngestionMetrics;
use crate::frame::FrameDecoder;
use crate::listener::Datagram;
use crate::registry::DeviceHandlerRegistry;

/// Decode stage of the processing loop
///
/// Every failure is counted and logged here; callers only need to skip
/// the datagram on `Err`.
#[derive(Debug)]
pub struct IngestionPipeline {
    registry: DeviceHandlerRegistry,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionPipeline {
    /// Create pipeline with its own metrics
    pub fn new(registry: DeviceHandlerRegistry) -> Self {
        Self {
            registry,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Share metrics with the listener
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Decode one payload
    pub fn process(
        &self,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<DeviceEvent, DecodeError> {
        let result = FrameDecoder::decode(payload, received_at)
            .and_then(|frame| self.registry.dispatch(&frame));

        match &result {
            Ok(event) => {
                self.metrics.record_decoded();
                observability::record_event_decoded(&event.device_type);
                debug!(
                    device_type = %event.device_type,
                    device_id = event.device_id,
                    payload = event.payload.kind(),
                    "event decoded"
                );
            }
            Err(err) => {
                let unknown = matches!(err, DecodeError::UnknownDeviceType { .. });
                self.metrics.record_decode_error(unknown);
                observability::record_decode_error(err);
                if unknown {
                    debug!(error = %err, "datagram dropped");
                } else {
                    warn!(kind = err.kind(), error = %err, "datagram dropped");
                }
            }
        }

        result
    }

    /// Decode one received datagram
    pub fn process_datagram(&self, datagram: &Datagram) -> Result<DeviceEvent, DecodeError> {
        self.process(&datagram.payload, datagram.received_at)
    }

    /// Get registry reference
    pub fn registry(&self) -> &DeviceHandlerRegistry {
        &self.registry
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new(DeviceHandlerRegistry::with_defaults())
    }
}
