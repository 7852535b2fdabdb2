//! Pipeline metrics module
//!
//! Thin wrappers over the `metrics` facade so every crate reports under the
//! same names and labels. Without an installed recorder these are no-ops.

use contracts::{DecodeError, SinkError};
use metrics::{counter, gauge, histogram};

/// Record a datagram received on a UDP port
pub fn record_packet_received(port: u16) {
    counter!(
        "loxprox_packets_received_total",
        "port" => port.to_string()
    )
    .increment(1);
}

/// Record a datagram dropped before decoding (listener queue full)
pub fn record_packet_dropped(port: u16) {
    counter!(
        "loxprox_packets_dropped_total",
        "port" => port.to_string()
    )
    .increment(1);
}

/// Record a decode failure by kind
pub fn record_decode_error(err: &DecodeError) {
    counter!(
        "loxprox_decode_errors_total",
        "kind" => err.kind()
    )
    .increment(1);
}

/// Record a successfully decoded event
pub fn record_event_decoded(device_type: &str) {
    counter!(
        "loxprox_events_decoded_total",
        "device_type" => device_type.to_string()
    )
    .increment(1);
}

/// Record one sink delivery outcome
///
/// `outcome` is `delivered`, `ignored` or a [`SinkError::kind`] label.
pub fn record_delivery(sink_name: &str, outcome: &'static str) {
    counter!(
        "loxprox_deliveries_total",
        "sink" => sink_name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a sink failure
pub fn record_sink_error(sink_name: &str, err: &SinkError) {
    record_delivery(sink_name, err.kind());
}

/// Record an event dropped because the sink queue was full
pub fn record_queue_drop(sink_name: &str) {
    counter!(
        "loxprox_sink_queue_dropped_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Record a route naming a sink that is not running
pub fn record_route_missing(sink_name: &str) {
    counter!(
        "loxprox_route_missing_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Record an output that could not be started and runs without
pub fn record_sink_unavailable(sink_name: &str) {
    counter!(
        "loxprox_sink_unavailable_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Record the broker connection state (0 disconnected, 1 connecting,
/// 2 connected, 3 backoff)
pub fn record_connection_state(sink_name: &str, code: u8) {
    gauge!(
        "loxprox_connection_state",
        "sink" => sink_name.to_string()
    )
    .set(f64::from(code));
}

/// Record a reconnect attempt
pub fn record_reconnect_attempt(sink_name: &str) {
    counter!(
        "loxprox_reconnect_attempts_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
}

/// Record sink call latency
pub fn record_delivery_latency_ms(sink_name: &str, latency_ms: f64) {
    histogram!(
        "loxprox_delivery_latency_ms",
        "sink" => sink_name.to_string()
    )
    .record(latency_ms);
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
