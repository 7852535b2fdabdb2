//! ProxyBlueprint - Config Loader output
//!
//! Canonical configuration: UDP inputs, output sinks and the routing table.
//! Both historical file shapes resolve to this one structure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyBlueprint {
    /// Inbound listeners
    #[serde(default)]
    pub inputs: InputsConfig,

    /// Output sinks, in declaration order
    #[serde(default)]
    pub outputs: Vec<SinkConfig>,

    /// Device type -> sink names
    #[serde(default)]
    pub routing: Vec<RouteConfig>,
}

impl ProxyBlueprint {
    /// Look up an output by name
    pub fn output(&self, name: &str) -> Option<&SinkConfig> {
        self.outputs.iter().find(|output| output.name == name)
    }

    /// Outputs that will actually be built
    pub fn enabled_outputs(&self) -> impl Iterator<Item = &SinkConfig> {
        self.outputs.iter().filter(|output| output.enabled)
    }

    /// Look up the route for a device type
    pub fn route(&self, device_type: &str) -> Option<&RouteConfig> {
        self.routing
            .iter()
            .find(|route| route.device_type == device_type)
    }
}

/// Inbound configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub udp: UdpInputConfig,
}

/// UDP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdpInputConfig {
    /// Bind address
    #[serde(default = "default_ip")]
    pub ip: String,

    /// One receiver per port
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Echo every datagram back to its sender
    #[serde(default = "default_true")]
    pub echo: bool,
}

impl Default for UdpInputConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            ports: default_ports(),
            echo: true,
        }
    }
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_ports() -> Vec<u16> {
    vec![52001]
}

fn default_true() -> bool {
    true
}

/// Sink output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name, referenced by routes
    pub name: String,

    /// Disabled outputs are not built
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Worker queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific settings
    pub settings: SinkSettings,
}

impl SinkConfig {
    pub fn sink_type(&self) -> SinkType {
        self.settings.sink_type()
    }
}

pub fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Lighting bridge (Philips Hue API v1)
    Hue,
    /// Message broker (MQTT)
    Mqtt,
    /// Metrics collector (Telegraf line protocol over UDP)
    Telegraf,
}

impl SinkType {
    /// Parse a configured type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hue" => Some(Self::Hue),
            "mqtt" => Some(Self::Mqtt),
            "telegraf" => Some(Self::Telegraf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hue => "hue",
            Self::Mqtt => "mqtt",
            Self::Telegraf => "telegraf",
        }
    }
}

impl std::fmt::Display for SinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkSettings {
    Hue(HueSettings),
    Mqtt(MqttSettings),
    Telegraf(TelegrafSettings),
}

impl SinkSettings {
    pub fn sink_type(&self) -> SinkType {
        match self {
            Self::Hue(_) => SinkType::Hue,
            Self::Mqtt(_) => SinkType::Mqtt,
            Self::Telegraf(_) => SinkType::Telegraf,
        }
    }
}

/// Hue bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HueSettings {
    /// Bridge address
    pub bridge_ip: String,

    /// Whitelisted API user
    pub username: String,

    /// Per-request timeout
    #[serde(default = "default_hue_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_hue_timeout_ms() -> u64 {
    5000
}

/// MQTT broker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Topic root, `{topic_prefix}/type/{topic_name}`
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Base client id; the hostname is appended on connect
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keepalive_secs", alias = "keepalive")]
    pub keepalive_secs: u64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Device type -> topic name aliases (e.g. `ph: hue`)
    #[serde(default)]
    pub topic_names: BTreeMap<String, String>,

    /// Reconnect schedule
    #[serde(default)]
    pub retry: RetrySettings,
}

impl MqttSettings {
    /// Full topic for a device type
    pub fn topic_for(&self, device_type: &str) -> String {
        let name = self
            .topic_names
            .get(device_type)
            .map(String::as_str)
            .unwrap_or(device_type);
        format!("{}/type/{}", self.topic_prefix, name)
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            topic_prefix: default_topic_prefix(),
            client_id: default_client_id(),
            keepalive_secs: default_keepalive_secs(),
            username: None,
            password: None,
            topic_names: BTreeMap::new(),
            retry: RetrySettings::default(),
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topic_prefix() -> String {
    "loxone".to_string()
}

fn default_client_id() -> String {
    "loxprox".to_string()
}

fn default_keepalive_secs() -> u64 {
    60
}

/// Reconnect backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Backoff while fewer than `fast_attempts` consecutive failures
    #[serde(default = "default_short_interval")]
    pub short_interval_secs: u64,

    /// Backoff once the fast attempts are used up
    #[serde(default = "default_long_interval")]
    pub long_interval_secs: u64,

    #[serde(default = "default_fast_attempts")]
    pub fast_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            short_interval_secs: default_short_interval(),
            long_interval_secs: default_long_interval(),
            fast_attempts: default_fast_attempts(),
        }
    }
}

fn default_short_interval() -> u64 {
    60
}

fn default_long_interval() -> u64 {
    1800
}

fn default_fast_attempts() -> u32 {
    15
}

/// Telegraf socket listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegrafSettings {
    #[serde(default = "default_telegraf_host")]
    pub host: String,

    #[serde(default = "default_telegraf_port")]
    pub port: u16,
}

impl Default for TelegrafSettings {
    fn default() -> Self {
        Self {
            host: default_telegraf_host(),
            port: default_telegraf_port(),
        }
    }
}

fn default_telegraf_host() -> String {
    "localhost".to_string()
}

fn default_telegraf_port() -> u16 {
    8094
}

/// Route for one device type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub device_type: String,

    /// Sink names; insertion order is delivery order
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_defaults() {
        let udp: UdpInputConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(udp.ip, "0.0.0.0");
        assert_eq!(udp.ports, vec![52001]);
        assert!(udp.echo);
    }

    #[test]
    fn test_mqtt_defaults_and_topic() {
        let mut mqtt: MqttSettings = serde_json::from_str(r#"{"keepalive": 30}"#).unwrap();
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.keepalive_secs, 30);
        assert_eq!(mqtt.retry, RetrySettings::default());
        assert_eq!(mqtt.topic_for("ph"), "loxone/type/ph");

        mqtt.topic_names.insert("ph".into(), "hue".into());
        assert_eq!(mqtt.topic_for("ph"), "loxone/type/hue");
        assert_eq!(mqtt.topic_for("pm"), "loxone/type/pm");
    }

    #[test]
    fn test_blueprint_lookups() {
        let blueprint = ProxyBlueprint {
            inputs: InputsConfig::default(),
            outputs: vec![
                SinkConfig {
                    name: "metrics".into(),
                    enabled: true,
                    queue_capacity: 10,
                    settings: SinkSettings::Telegraf(TelegrafSettings::default()),
                },
                SinkConfig {
                    name: "broker".into(),
                    enabled: false,
                    queue_capacity: 10,
                    settings: SinkSettings::Mqtt(MqttSettings::default()),
                },
            ],
            routing: vec![RouteConfig {
                device_type: "pm".into(),
                outputs: vec!["metrics".into()],
            }],
        };

        assert_eq!(
            blueprint.output("metrics").map(SinkConfig::sink_type),
            Some(SinkType::Telegraf)
        );
        assert_eq!(blueprint.enabled_outputs().count(), 1);
        assert!(blueprint.route("pm").is_some());
        assert!(blueprint.route("ph").is_none());
    }
}
