//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse YAML/TOML/JSON configuration files
//! - Resolve the legacy flat shape and the nested shape to one structure
//! - Validate configuration legality
//! - Generate `ProxyBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("loxprox.yml")).unwrap();
//! println!("Ports: {:?}", blueprint.inputs.udp.ports);
//! ```

mod migrate;
mod parser;
mod validator;

pub use contracts::ProxyBlueprint;
pub use migrate::ConfigWarning;
pub use parser::ConfigFormat;
pub use validator::validate;

use contracts::ContractError;
use std::path::Path;

/// Loaded configuration with its non-fatal findings
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub blueprint: ProxyBlueprint,
    pub warnings: Vec<ConfigWarning>,
}

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.yml / .toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ProxyBlueprint, ContractError> {
        Self::load_with_warnings(path).map(|loaded| loaded.blueprint)
    }

    /// Load configuration from file path, keeping migration and validation warnings
    pub fn load_with_warnings(path: &Path) -> Result<LoadedConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::parse_and_validate(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ProxyBlueprint, ContractError> {
        Self::parse_and_validate(content, format).map(|loaded| loaded.blueprint)
    }

    /// Load configuration from string, keeping warnings
    pub fn load_str_with_warnings(
        content: &str,
        format: ConfigFormat,
    ) -> Result<LoadedConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize the canonical ProxyBlueprint to JSON string
    pub fn to_json(blueprint: &ProxyBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse, migrate and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<LoadedConfig, ContractError> {
        let raw = parser::parse(content, format)?;
        let migrate::Migration {
            blueprint,
            mut warnings,
        } = migrate::migrate(raw)?;
        warnings.extend(validator::validate(&blueprint)?);
        Ok(LoadedConfig {
            blueprint,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;
    use std::io::Write;

    const NESTED_YAML: &str = r#"
inputs:
  udp:
    ip: 0.0.0.0
    ports: [52001]
outputs:
  hue:
    bridge_ip: 192.168.1.10
    username: abc
  mqtt:
    host: broker
    topic_prefix: loxone
  telegraf:
    host: 192.168.1.7
    port: 8094
routing:
  ph:
    outputs: [hue, mqtt]
  pm:
    outputs: [telegraf]
"#;

    #[test]
    fn test_load_from_str_yaml() {
        let result = ConfigLoader::load_from_str(NESTED_YAML, ConfigFormat::Yaml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.outputs.len(), 3);
        assert_eq!(
            bp.output("telegraf").map(|o| o.sink_type()),
            Some(SinkType::Telegraf)
        );
        assert_eq!(bp.route("pm").unwrap().outputs, vec!["telegraf"]);
    }

    #[test]
    fn test_yaml_toml_json_agree() {
        let toml = r#"
[inputs.udp]
ip = "0.0.0.0"
ports = [52001]

[outputs.hue]
bridge_ip = "192.168.1.10"
username = "abc"

[outputs.mqtt]
host = "broker"
topic_prefix = "loxone"

[outputs.telegraf]
host = "192.168.1.7"
port = 8094

[routing.ph]
outputs = ["hue", "mqtt"]

[routing.pm]
outputs = ["telegraf"]
"#;
        let json = r#"{
            "inputs": {"udp": {"ip": "0.0.0.0", "ports": [52001]}},
            "outputs": {
                "hue": {"bridge_ip": "192.168.1.10", "username": "abc"},
                "mqtt": {"host": "broker", "topic_prefix": "loxone"},
                "telegraf": {"host": "192.168.1.7", "port": 8094}
            },
            "routing": {"ph": {"outputs": ["hue", "mqtt"]}, "pm": {"outputs": ["telegraf"]}}
        }"#;

        let from_yaml = ConfigLoader::load_from_str(NESTED_YAML, ConfigFormat::Yaml).unwrap();
        let from_toml = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        let from_json = ConfigLoader::load_from_str(json, ConfigFormat::Json).unwrap();
        assert_eq!(from_yaml, from_toml);
        assert_eq!(from_yaml, from_json);
    }

    #[test]
    fn test_validation_runs_after_migration() {
        let content = "inputs:\n  udp:\n    ports: [52001, 52001]\n";
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_warnings_are_collected() {
        let content = r#"
hue_bridge: { ip: 192.168.1.10, username: abc }
routing:
  pm: [telegraf]
"#;
        let loaded = ConfigLoader::load_str_with_warnings(content, ConfigFormat::Yaml).unwrap();
        let text: Vec<String> = loaded.warnings.iter().map(ToString::to_string).collect();
        assert!(text.iter().any(|w| w.starts_with("hue_bridge")), "got: {text:?}");
        assert!(text.iter().any(|w| w.contains("unknown output 'telegraf'")));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(NESTED_YAML.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.inputs.udp.ports, vec![52001]);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_to_json() {
        let bp = ConfigLoader::load_from_str(NESTED_YAML, ConfigFormat::Yaml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        assert!(json.contains("\"type\": \"mqtt\""));
    }
}
