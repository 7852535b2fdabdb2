//! Sink implementations
//!
//! Contains BridgeSink (Hue), BrokerSink (MQTT) and MetricsSink (Telegraf).

mod hue;
mod mqtt;
mod telegraf;

pub use self::hue::{rgb_to_xy, BridgeSink, HueHttpBridge, LightBridge, LightCommand};
pub use self::mqtt::{BrokerSink, RumqttTransport};
pub use self::telegraf::{line_protocol, MetricsSink};
