//! Configuration parsing module
//!
//! Supports YAML (historical format), TOML and JSON. Parsing only produces
//! the loosely typed [`RawConfig`]; shape reconciliation happens in
//! `migrate`.

use std::collections::BTreeMap;

use contracts::ContractError;
use serde::Deserialize;
use serde_json::Value;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format (default for loxprox.yml)
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yml" | "yaml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration as written on disk, either shape
///
/// `outputs` and `routing` stay untyped here because their entries are
/// normalized leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub inputs: Option<RawInputs>,

    #[serde(default)]
    pub outputs: Option<BTreeMap<String, Value>>,

    #[serde(default)]
    pub routing: Option<BTreeMap<String, Value>>,

    /// Legacy flat listener section
    #[serde(default)]
    pub udp_server: Option<RawUdp>,

    /// Legacy flat Hue section
    #[serde(default)]
    pub hue_bridge: Option<RawHueBridge>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInputs {
    #[serde(default)]
    pub udp: Option<RawUdp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUdp {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ports: Option<Vec<u16>>,
    #[serde(default)]
    pub echo: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawHueBridge {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Parse YAML configuration
pub fn parse_yaml(content: &str) -> Result<RawConfig, ContractError> {
    // An empty document is an empty configuration, not an error
    if content.trim().is_empty() {
        return Ok(RawConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("YAML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<RawConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<RawConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse configuration by format
pub fn parse(content: &str, format: ConfigFormat) -> Result<RawConfig, ContractError> {
    match format {
        ConfigFormat::Yaml => parse_yaml(content),
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_nested() {
        let content = r#"
inputs:
  udp:
    ip: 127.0.0.1
    ports: [52001, 52002]
outputs:
  mqtt:
    host: broker
routing:
  ph:
    outputs: [mqtt]
"#;
        let raw = parse_yaml(content).unwrap();
        let udp = raw.inputs.unwrap().udp.unwrap();
        assert_eq!(udp.ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(udp.ports, Some(vec![52001, 52002]));
        assert!(raw.outputs.unwrap().contains_key("mqtt"));
        assert!(raw.routing.unwrap().contains_key("ph"));
    }

    #[test]
    fn test_parse_yaml_legacy() {
        let content = r#"
udp_server:
  ip: 0.0.0.0
  ports: [52001]
hue_bridge:
  ip: 192.168.1.10
  username: abc
"#;
        let raw = parse_yaml(content).unwrap();
        assert!(raw.inputs.is_none());
        assert_eq!(raw.hue_bridge.unwrap().username.as_deref(), Some("abc"));
        assert_eq!(raw.udp_server.unwrap().ports, Some(vec![52001]));
    }

    #[test]
    fn test_parse_empty_yaml() {
        let raw = parse_yaml("  \n").unwrap();
        assert!(raw.outputs.is_none());
    }

    #[test]
    fn test_parse_toml_nested() {
        let content = r#"
[inputs.udp]
ports = [52001]
echo = false

[outputs.telegraf]
host = "10.0.0.7"

[routing]
pm = ["telegraf"]
"#;
        let raw = parse_toml(content).unwrap();
        assert_eq!(raw.inputs.unwrap().udp.unwrap().echo, Some(false));
        assert!(raw.routing.unwrap()["pm"].is_array());
    }

    #[test]
    fn test_parse_json_minimal() {
        let raw = parse_json(r#"{"routing": {"ph": "hue"}}"#).unwrap();
        assert_eq!(raw.routing.unwrap()["ph"], "hue");
    }

    #[test]
    fn test_parse_syntax_error() {
        let err = parse_toml("invalid toml [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));

        let err = parse_yaml("inputs: [unclosed").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("yml"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("YAML"), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("ini"), None);
    }
}
