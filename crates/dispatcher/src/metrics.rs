//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Events the sink acted on
    delivered_count: AtomicU64,
    /// Events the sink had nothing to do for
    ignored_count: AtomicU64,
    /// `DeliveryFailed` outcomes
    failure_count: AtomicU64,
    /// `NotConnected` outcomes
    not_connected_count: AtomicU64,
    /// Events dropped due to full queue
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored_count.load(Ordering::Relaxed)
    }

    pub fn inc_ignored_count(&self) {
        self.ignored_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn not_connected_count(&self) -> u64 {
        self.not_connected_count.load(Ordering::Relaxed)
    }

    pub fn inc_not_connected_count(&self) {
        self.not_connected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered_count: self.delivered_count(),
            ignored_count: self.ignored_count(),
            failure_count: self.failure_count(),
            not_connected_count: self.not_connected_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered_count: u64,
    pub ignored_count: u64,
    pub failure_count: u64,
    pub not_connected_count: u64,
    pub dropped_count: u64,
}

impl MetricsSnapshot {
    /// Events that reached the sink worker, whatever the outcome
    pub fn processed(&self) -> u64 {
        self.delivered_count + self.ignored_count + self.failure_count + self.not_connected_count
    }
}
