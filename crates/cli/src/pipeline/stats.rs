//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::DeliveryReport;
use observability::RunningStats;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub datagrams: u64,
    pub events_decoded: u64,
    pub decode_errors: u64,

    pub deliveries_enqueued: u64,

    /// Events lost to a full sink queue
    pub deliveries_dropped: u64,

    /// Routed sink names with no running sink
    pub routes_missing: u64,

    /// Decoded events whose type has no route
    pub unrouted_events: u64,

    pub duration: Duration,

    /// Listener and decoder counters
    pub ingestion: ingestion::MetricsSnapshot,

    /// Per-sink worker counters
    pub sinks: Vec<(String, dispatcher::MetricsSnapshot)>,

    /// Decode plus fan-out time per datagram (ms)
    pub latency: RunningStats,
}

impl PipelineStats {
    /// Fold one fan-out result into the totals
    pub fn record_delivery(&mut self, report: &DeliveryReport) {
        if report.routed == 0 {
            self.unrouted_events += 1;
        }
        self.deliveries_enqueued += report.enqueued as u64;
        self.deliveries_dropped += report.dropped as u64;
        self.routes_missing += report.missing as u64;
    }

    /// Datagrams per second
    pub fn rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.datagrams as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Decode errors as percentage of datagrams
    pub fn error_rate(&self) -> f64 {
        if self.datagrams > 0 {
            (self.decode_errors as f64 / self.datagrams as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Proxy Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Datagrams: {}", self.datagrams);
        println!("   ├─ Rate: {:.2}/s", self.rate());
        println!("   ├─ Events decoded: {}", self.events_decoded);
        println!(
            "   ├─ Decode errors: {} ({:.2}%)",
            self.decode_errors,
            self.error_rate()
        );
        println!("   └─ Processing latency (ms): {}", self.latency.summary());

        println!("\n📥 Listener");
        println!("   ├─ Received: {}", self.ingestion.packets_received);
        println!("   ├─ Echoed: {}", self.ingestion.packets_echoed);
        println!("   ├─ Dropped (channel full): {}", self.ingestion.packets_dropped);
        println!("   └─ Unknown device types: {}", self.ingestion.unknown_types);

        println!("\n🔀 Routing");
        println!("   ├─ Enqueued: {}", self.deliveries_enqueued);
        println!("   ├─ Dropped (queue full): {}", self.deliveries_dropped);
        println!("   ├─ Missing sinks: {}", self.routes_missing);
        println!("   └─ Unrouted events: {}", self.unrouted_events);

        if !self.sinks.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, sink)) in self.sinks.iter().enumerate() {
                let prefix = if i == self.sinks.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {}: delivered={} ignored={} failed={} not_connected={} dropped={}",
                    prefix,
                    name,
                    sink.delivered_count,
                    sink.ignored_count,
                    sink.failure_count,
                    sink.not_connected_count,
                    sink.dropped_count
                );
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_delivery() {
        let mut stats = PipelineStats::default();
        stats.record_delivery(&DeliveryReport {
            routed: 2,
            enqueued: 1,
            dropped: 1,
            missing: 0,
        });
        stats.record_delivery(&DeliveryReport::default());

        assert_eq!(stats.deliveries_enqueued, 1);
        assert_eq!(stats.deliveries_dropped, 1);
        assert_eq!(stats.unrouted_events, 1);
    }

    #[test]
    fn test_rates() {
        let stats = PipelineStats {
            datagrams: 200,
            decode_errors: 50,
            duration: Duration::from_secs(4),
            ..Default::default()
        };
        assert_eq!(stats.rate(), 50.0);
        assert_eq!(stats.error_rate(), 25.0);
        assert_eq!(PipelineStats::default().rate(), 0.0);
    }
}
