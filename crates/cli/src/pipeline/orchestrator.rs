//! Pipeline orchestrator - coordinates all components.
//!
//! ```text
//! UdpListener -> IngestionPipeline -> OutputManager -> sink workers
//! ```
//!
//! The processing loop is a single task; sinks never block it.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::ProxyBlueprint;
use dispatcher::OutputManager;
use ingestion::{
    DeviceHandlerRegistry, IngestionPipeline, ListenerConfig, ListenerHandle, UdpListener,
};
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canonical proxy configuration
    pub blueprint: ProxyBlueprint,

    /// Stop after this many datagrams (None = unlimited)
    pub max_packets: Option<u64>,

    /// Listener to processing loop channel size
    pub channel_capacity: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Bind sockets, start sinks and run until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        self.start().await?.run(shutdown).await
    }

    /// Bind the listener and build every enabled sink
    pub async fn start(self) -> Result<RunningPipeline> {
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let registry = DeviceHandlerRegistry::with_defaults();
        info!(device_types = ?registry.supported_types(), "Decoders registered");

        let listener_config = ListenerConfig {
            channel_capacity: self.config.channel_capacity,
            ..ListenerConfig::from(&blueprint.inputs.udp)
        };
        let listener = UdpListener::bind(listener_config).await.with_context(|| {
            format!(
                "Failed to bind UDP listener on {} ports {:?}",
                blueprint.inputs.udp.ip, blueprint.inputs.udp.ports
            )
        })?;

        let manager = dispatcher::create_output_manager(blueprint)
            .await
            .context("Failed to create output manager")?;
        if !manager.unavailable_sinks().is_empty() {
            warn!(unavailable = ?manager.unavailable_sinks(), "Some outputs failed to start");
        }
        if manager.sink_names().is_empty() {
            warn!("No outputs running - decoded events will be discarded");
        }
        info!(sinks = ?manager.sink_names(), "Output manager started");

        let ingestion = IngestionPipeline::new(registry).with_metrics(listener.metrics());
        let running = RunningPipeline {
            listener: listener.start(),
            ingestion,
            manager,
            max_packets: self.config.max_packets,
            started: Instant::now(),
        };
        info!(addrs = ?running.local_addrs(), "Listening for Loxone datagrams");

        Ok(running)
    }
}

/// A pipeline with bound sockets and running sink workers
pub struct RunningPipeline {
    listener: ListenerHandle,
    ingestion: IngestionPipeline,
    manager: OutputManager,
    max_packets: Option<u64>,
    started: Instant,
}

impl RunningPipeline {
    /// Addresses the listener is bound to
    pub fn local_addrs(&self) -> &[SocketAddr] {
        self.listener.local_addrs()
    }

    /// Process datagrams until shutdown, the packet limit or listener exit
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let RunningPipeline {
            listener,
            ingestion,
            manager,
            max_packets,
            started,
        } = self;

        let rx = listener.receiver();
        let mut stats = PipelineStats::default();
        tokio::pin!(shutdown);

        info!(max_packets = ?max_packets, "Pipeline running");

        loop {
            let datagram = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(datagram) => datagram,
                    Err(_) => {
                        warn!("Listener channel closed");
                        break;
                    }
                },
            };

            let begin = Instant::now();
            stats.datagrams += 1;

            match ingestion.process_datagram(&datagram) {
                Ok(event) => {
                    stats.events_decoded += 1;
                    let report = manager.deliver(&event);
                    stats.record_delivery(&report);
                    debug!(
                        device_type = %event.device_type,
                        device_id = event.device_id,
                        routed = report.routed,
                        enqueued = report.enqueued,
                        "Event dispatched"
                    );
                }
                Err(_) => stats.decode_errors += 1,
            }
            stats.latency.push(begin.elapsed().as_secs_f64() * 1000.0);

            if let Some(max) = max_packets {
                if stats.datagrams >= max {
                    info!(datagrams = stats.datagrams, "Reached max packets limit");
                    break;
                }
            }
        }

        info!("Shutting down pipeline...");
        listener.shutdown().await;

        let sink_metrics = manager.metric_handles();
        manager.shutdown().await;

        stats.ingestion = ingestion.metrics().snapshot();
        stats.sinks = sink_metrics
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect();
        stats.duration = started.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.rate()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
