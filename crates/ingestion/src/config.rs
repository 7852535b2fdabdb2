//! Listener configuration and ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::UdpInputConfig;

/// UDP listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind ip
    pub ip: String,

    /// One receiver task per port
    pub ports: Vec<u16>,

    /// Echo datagrams back to the sender
    pub echo: bool,

    /// Capacity of the channel feeding the processing loop
    pub channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::from(&UdpInputConfig::default())
    }
}

impl From<&UdpInputConfig> for ListenerConfig {
    fn from(udp: &UdpInputConfig) -> Self {
        Self {
            ip: udp.ip.clone(),
            ports: udp.ports.clone(),
            echo: udp.echo,
            channel_capacity: 1024,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Datagrams received on any port
    pub packets_received: AtomicU64,

    /// Datagrams dropped because the processing queue was full
    pub packets_dropped: AtomicU64,

    /// Datagrams echoed back
    pub packets_echoed: AtomicU64,

    /// Frames decoded into events
    pub events_decoded: AtomicU64,

    /// Decode failures (any kind)
    pub decode_errors: AtomicU64,

    /// Decode failures caused by unregistered prefixes
    pub unknown_types: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_echoed(&self) {
        self.packets_echoed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.events_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self, unknown_type: bool) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        if unknown_type {
            self.unknown_types.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            packets_echoed: self.packets_echoed.load(Ordering::Relaxed),
            events_decoded: self.events_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_types: self.unknown_types.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub packets_dropped: u64,
    pub packets_echoed: u64,
    pub events_decoded: u64,
    pub decode_errors: u64,
    pub unknown_types: u64,
}
