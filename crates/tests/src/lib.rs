//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Frame decoding of real Loxone payloads
//! - Config shapes (legacy flat vs nested)
//! - Fan-out isolation and routing through `OutputManager`
//! - UDP loopback: listener -> decoder -> Telegraf sink

/// Controller packet carrying an RGB light state
#[cfg(test)]
const RGB_FRAME: &[u8] = b"2025-07-18 12:03:06;udplight;ph9.100050025";

/// Controller packet carrying a tunable-white light state
#[cfg(test)]
const CCT_FRAME: &[u8] = b"2025-07-18 12:03:06;udplight;ph9.201003000";

#[cfg(test)]
mod contract_tests {
    use chrono::Utc;
    use contracts::{CctState, DevicePayload, RgbState};
    use ingestion::IngestionPipeline;

    use super::{CCT_FRAME, RGB_FRAME};

    #[test]
    fn test_rgb_and_cct_payloads_decode() {
        let pipeline = IngestionPipeline::default();

        let rgb = pipeline.process(RGB_FRAME, Utc::now()).unwrap();
        assert_eq!(rgb.device_type, "ph");
        assert_eq!(rgb.device_id, 9);
        assert_eq!(
            rgb.payload,
            DevicePayload::Rgb(RgbState {
                blue: 100,
                green: 50,
                red: 25,
            })
        );

        let cct = pipeline.process(CCT_FRAME, Utc::now()).unwrap();
        assert_eq!(cct.device_id, 9);
        assert_eq!(
            cct.payload,
            DevicePayload::Cct(CctState {
                brightness: 100,
                kelvin: 3000,
            })
        );
    }

    #[test]
    fn test_malformed_datagrams_are_counted() {
        let pipeline = IngestionPipeline::default();
        for payload in [&b""[..], b"ts;src", b"ts;src;xx1.100050025", b"ts;src;ph9.1000"] {
            assert!(pipeline.process(payload, Utc::now()).is_err());
        }
        let snapshot = pipeline.metrics().snapshot();
        assert_eq!(snapshot.decode_errors, 4);
        assert_eq!(snapshot.events_decoded, 0);
        assert_eq!(snapshot.unknown_types, 1);
    }

    #[test]
    fn test_legacy_config_matches_nested() {
        use config_loader::{ConfigFormat, ConfigLoader};

        let legacy = ConfigLoader::load_from_str(
            "udp_server:\n  ip: 0.0.0.0\n  ports: [52001]\nhue_bridge:\n  ip: 192.168.1.10\n  username: abc\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        let nested = ConfigLoader::load_from_str(
            r#"
inputs:
  udp: { ip: 0.0.0.0, ports: [52001] }
outputs:
  hue: { bridge_ip: 192.168.1.10, username: abc }
routing:
  ph: { outputs: [hue] }
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(legacy, nested);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use contracts::{
        Ack, DeviceEvent, MqttSettings, RetrySettings, RouteConfig, Sink, SinkConfig, SinkError,
        SinkSettings, TelegrafSettings,
    };
    use dispatcher::{BrokerSink, OutputManager, RoutingTable, SinkHandle};
    use ingestion::{IngestionPipeline, ListenerConfig, UdpListener};
    use tokio::net::UdpSocket;

    use super::{CCT_FRAME, RGB_FRAME};

    /// Sink that counts deliveries, optionally failing every send
    struct CountingSink {
        name: String,
        count: Arc<AtomicU64>,
        fail: bool,
    }

    impl CountingSink {
        fn new(name: &str, fail: bool) -> (Self, Arc<AtomicU64>) {
            let count = Arc::new(AtomicU64::new(0));
            let sink = Self {
                name: name.to_string(),
                count: count.clone(),
                fail,
            };
            (sink, count)
        }
    }

    impl Sink for CountingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&mut self, _event: &DeviceEvent) -> Result<Ack, SinkError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SinkError::delivery_failed(&self.name, "bridge unreachable"))
            } else {
                Ok(Ack::Delivered)
            }
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn route(device_type: &str, outputs: &[&str]) -> RouteConfig {
        RouteConfig {
            device_type: device_type.to_string(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn decode(payload: &[u8]) -> DeviceEvent {
        IngestionPipeline::default()
            .process(payload, Utc::now())
            .unwrap()
    }

    /// A failing sink must not stop its sibling from receiving the event
    #[tokio::test]
    async fn test_failing_sink_does_not_block_sibling() {
        let (failing, failing_count) = CountingSink::new("a", true);
        let (healthy, healthy_count) = CountingSink::new("b", false);
        let manager = OutputManager::new(
            RoutingTable::new(&[route("ph", &["a", "b"])]),
            vec![SinkHandle::spawn(failing, 8), SinkHandle::spawn(healthy, 8)],
        )
        .unwrap();

        let report = manager.deliver(&decode(RGB_FRAME));
        assert_eq!(report.routed, 2);
        assert_eq!(report.enqueued, 2);

        let metrics = manager.metric_handles();
        manager.shutdown().await;

        assert_eq!(failing_count.load(Ordering::SeqCst), 1);
        assert_eq!(healthy_count.load(Ordering::SeqCst), 1);
        let (_, a) = metrics.iter().find(|(name, _)| name == "a").unwrap();
        let (_, b) = metrics.iter().find(|(name, _)| name == "b").unwrap();
        assert_eq!(a.failure_count(), 1);
        assert_eq!(b.delivered_count(), 1);
    }

    /// Events of a type with no route reach no sink
    #[tokio::test]
    async fn test_unrouted_type_reaches_no_sink() {
        let (sink, count) = CountingSink::new("a", false);
        let manager = OutputManager::new(
            RoutingTable::new(&[route("ph", &["a"])]),
            vec![SinkHandle::spawn(sink, 8)],
        )
        .unwrap();

        let report = manager.deliver(&decode(b"2025-07-18 12:03:06;udppower;pm4.1250"));
        assert_eq!(report.routed, 0);
        manager.shutdown().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    /// A broker that never accepts yields one NotConnected and no replay
    #[tokio::test]
    async fn test_unreachable_broker_reports_not_connected_once() {
        let closed_port = {
            let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            socket.local_addr().unwrap().port()
        };
        let settings = MqttSettings {
            host: "127.0.0.1".into(),
            port: closed_port,
            retry: RetrySettings {
                short_interval_secs: 60,
                long_interval_secs: 60,
                fast_attempts: 15,
            },
            ..Default::default()
        };

        let broker = BrokerSink::connect("broker", &settings);
        let manager = OutputManager::new(
            RoutingTable::new(&[route("ph", &["broker"])]),
            vec![SinkHandle::spawn(broker, 8)],
        )
        .unwrap();

        manager.deliver(&decode(RGB_FRAME));
        let metrics = manager.metric_handles();
        tokio::time::timeout(Duration::from_secs(5), manager.shutdown())
            .await
            .unwrap();

        let snapshot = metrics[0].1.snapshot();
        assert_eq!(snapshot.not_connected_count, 1);
        assert_eq!(snapshot.delivered_count, 0);
        assert_eq!(snapshot.processed(), 1);
    }

    /// Full path over loopback: Loxone datagram in, line protocol out
    #[tokio::test]
    async fn test_udp_to_telegraf_loopback() {
        let telegraf = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let outputs = vec![SinkConfig {
            name: "telegraf".into(),
            enabled: true,
            queue_capacity: 16,
            settings: SinkSettings::Telegraf(TelegrafSettings {
                host: "127.0.0.1".into(),
                port: telegraf.local_addr().unwrap().port(),
            }),
        }];
        let manager = dispatcher::OutputManagerBuilder::new(outputs, vec![route("ph", &["telegraf"])])
            .build()
            .await
            .unwrap();

        let listener = UdpListener::bind(ListenerConfig {
            ip: "127.0.0.1".into(),
            ports: vec![0],
            echo: true,
            channel_capacity: 16,
        })
        .await
        .unwrap();
        let pipeline = IngestionPipeline::default().with_metrics(listener.metrics());
        let handle = listener.start();
        let target = handle.local_addrs()[0];

        let loxone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        loxone.send_to(CCT_FRAME, target).await.unwrap();

        // Echo comes back to the sender unchanged
        let mut buf = [0u8; 256];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), loxone.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], CCT_FRAME);

        let datagram = tokio::time::timeout(Duration::from_secs(2), handle.receiver().recv())
            .await
            .unwrap()
            .unwrap();
        let event = pipeline.process_datagram(&datagram).unwrap();
        assert_eq!(manager.deliver(&event).enqueued, 1);

        let (len, _) = tokio::time::timeout(Duration::from_secs(2), telegraf.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let line = std::str::from_utf8(&buf[..len]).unwrap();
        assert!(line.starts_with("ph,device_id=9 brightness=100i,kelvin=3000i,mode=\"cct\" "));

        handle.shutdown().await;
        manager.shutdown().await;
        assert_eq!(pipeline.metrics().snapshot().packets_echoed, 1);
    }
}
