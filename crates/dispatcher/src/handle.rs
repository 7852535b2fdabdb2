//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use contracts::{Ack, DeviceEvent, Sink, SinkError};

use crate::metrics::SinkMetrics;

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send events to worker
    tx: mpsc::Sender<DeviceEvent>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: Sink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Hand an event to the sink (non-blocking)
    ///
    /// Returns true if enqueued, false if the queue was full (event dropped)
    pub fn try_send(&self, event: DeviceEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(e)) => {
                self.metrics.inc_dropped_count();
                observability::record_queue_drop(&self.name);
                warn!(
                    sink = %self.name,
                    device_type = %e.device_type,
                    device_id = e.device_id,
                    "Queue full, event dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Drain the queue, close the sink and wait for the worker
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Dropping the sender ends the worker loop once the queue is empty
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes events and hands them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: Sink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DeviceEvent>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(event) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let started = Instant::now();
        let result = sink.send(&event).await;
        observability::record_delivery_latency_ms(
            &name,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        match result {
            Ok(Ack::Delivered) => {
                metrics.inc_delivered_count();
                observability::record_delivery(&name, "delivered");
                trace!(sink = %name, device_id = event.device_id, "Delivered");
            }
            Ok(Ack::Ignored) => {
                metrics.inc_ignored_count();
                observability::record_delivery(&name, "ignored");
            }
            Err(e) => {
                match e {
                    SinkError::NotConnected { .. } => metrics.inc_not_connected_count(),
                    SinkError::DeliveryFailed { .. } => metrics.inc_failure_count(),
                }
                observability::record_sink_error(&name, &e);
                warn!(
                    sink = %name,
                    device_type = %event.device_type,
                    device_id = event.device_id,
                    error = %e,
                    "Delivery failed"
                );
                // Keep going, a single failure never stops the worker
            }
        }
    }

    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
