//! OutputManager - routes decoded events to sink workers

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, trace, warn};

use contracts::{DeviceEvent, ProxyBlueprint, RouteConfig, SinkConfig, SinkSettings};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::routing::RoutingTable;
use crate::sinks::{BridgeSink, BrokerSink, MetricsSink};

/// Outcome of one `deliver` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sink names the route lists
    pub routed: usize,
    /// Events handed to a worker queue
    pub enqueued: usize,
    /// Events dropped on a full queue
    pub dropped: usize,
    /// Route targets with no running sink
    pub missing: usize,
}

/// Builder for creating an OutputManager
pub struct OutputManagerBuilder {
    outputs: Vec<SinkConfig>,
    routing: Vec<RouteConfig>,
    handles: Vec<SinkHandle>,
}

impl OutputManagerBuilder {
    /// Create a new OutputManagerBuilder
    pub fn new(outputs: Vec<SinkConfig>, routing: Vec<RouteConfig>) -> Self {
        Self {
            outputs,
            routing,
            handles: Vec::new(),
        }
    }

    pub fn from_blueprint(blueprint: &ProxyBlueprint) -> Self {
        Self::new(blueprint.outputs.clone(), blueprint.routing.clone())
    }

    /// Add an already running sink
    pub fn with_handle(mut self, handle: SinkHandle) -> Self {
        self.handles.push(handle);
        self
    }

    /// Build the enabled sinks and start their workers
    ///
    /// An output that fails to start (unresolvable host, client setup) is
    /// logged, counted and left out; the remaining outputs still run.
    #[instrument(name = "output_manager_builder_build", skip(self))]
    pub async fn build(self) -> Result<OutputManager, DispatcherError> {
        let mut handles = self.handles;
        let (started, unavailable) = Self::initialize_handles(&self.outputs).await;
        handles.extend(started);

        let mut manager = OutputManager::new(RoutingTable::new(&self.routing), handles)?;
        manager.unavailable = unavailable;
        manager.warn_missing_routes();
        Ok(manager)
    }

    #[instrument(
        name = "output_manager_initialize_handles",
        skip(outputs),
        fields(sink_count = outputs.len())
    )]
    async fn initialize_handles(outputs: &[SinkConfig]) -> (Vec<SinkHandle>, Vec<String>) {
        let mut handles = Vec::with_capacity(outputs.len());
        let mut unavailable = Vec::new();
        for config in outputs {
            if !config.enabled {
                debug!(sink = %config.name, "Sink disabled, skipped");
                continue;
            }
            match create_sink_handle(config).await {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    observability::record_sink_unavailable(&config.name);
                    error!(
                        sink = %config.name,
                        error = %e,
                        "Failed to start sink, running without it"
                    );
                    unavailable.push(config.name.clone());
                }
            }
        }
        (handles, unavailable)
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "output_manager_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = %config.sink_type())
)]
async fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match &config.settings {
        SinkSettings::Hue(settings) => {
            let sink = BridgeSink::from_settings(&config.name, settings)?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkSettings::Mqtt(settings) => {
            let sink = BrokerSink::connect(&config.name, settings);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkSettings::Telegraf(settings) => {
            let sink = MetricsSink::from_settings(&config.name, settings).await?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans decoded events out to the sinks their device type routes to
///
/// `deliver` never awaits: every sink is fed through its own bounded
/// queue, so a slow or failing sink only loses its own events.
pub struct OutputManager {
    routing: RoutingTable,
    handles: Vec<SinkHandle>,
    by_name: HashMap<String, usize>,
    unavailable: Vec<String>,
}

impl OutputManager {
    /// Create a manager over running handles
    pub fn new(routing: RoutingTable, handles: Vec<SinkHandle>) -> Result<Self, DispatcherError> {
        let mut by_name = HashMap::with_capacity(handles.len());
        for (index, handle) in handles.iter().enumerate() {
            if by_name.insert(handle.name().to_string(), index).is_some() {
                return Err(DispatcherError::DuplicateSink(handle.name().to_string()));
            }
        }

        info!(
            sinks = handles.len(),
            routes = routing.len(),
            "OutputManager ready"
        );
        Ok(Self {
            routing,
            handles,
            by_name,
            unavailable: Vec::new(),
        })
    }

    /// Hand `event` to every sink its device type routes to
    pub fn deliver(&self, event: &DeviceEvent) -> DeliveryReport {
        let targets = self.routing.sinks_for(&event.device_type);
        let mut report = DeliveryReport {
            routed: targets.len(),
            ..DeliveryReport::default()
        };

        if targets.is_empty() {
            trace!(device_type = %event.device_type, "No route, event not delivered");
            return report;
        }

        for name in targets {
            match self.handle(name) {
                Some(handle) => {
                    if handle.try_send(event.clone()) {
                        report.enqueued += 1;
                    } else {
                        report.dropped += 1;
                    }
                }
                None => {
                    report.missing += 1;
                    observability::record_route_missing(name);
                    debug!(
                        sink = %name,
                        device_type = %event.device_type,
                        "Route names a sink that is not running"
                    );
                }
            }
        }

        report
    }

    pub fn handle(&self, name: &str) -> Option<&SinkHandle> {
        self.by_name.get(name).map(|&index| &self.handles[index])
    }

    /// Running sink names in start order
    pub fn sink_names(&self) -> Vec<&str> {
        self.handles.iter().map(SinkHandle::name).collect()
    }

    /// Enabled outputs that failed to start
    pub fn unavailable_sinks(&self) -> &[String] {
        &self.unavailable
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Live metrics of every sink, readable after `shutdown`
    pub fn metric_handles(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Drain and close every sink
    #[instrument(name = "output_manager_shutdown", skip(self))]
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!("OutputManager shutdown complete");
    }

    fn warn_missing_routes(&self) {
        for device_type in self.routing.device_types() {
            for name in self.routing.sinks_for(device_type) {
                if self.handle(name).is_none() {
                    warn!(
                        device_type,
                        sink = %name,
                        "Route names a sink that is not running"
                    );
                }
            }
        }
    }
}

/// Convenience function to build an OutputManager from the canonical config
#[instrument(name = "output_manager_create", skip(blueprint))]
pub async fn create_output_manager(
    blueprint: &ProxyBlueprint,
) -> Result<OutputManager, DispatcherError> {
    OutputManagerBuilder::from_blueprint(blueprint).build().await
}
