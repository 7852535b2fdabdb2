//! Shape migration
//!
//! Pure translation from [`RawConfig`] (legacy flat or nested shape) to the
//! canonical [`ProxyBlueprint`]. The core never branches on config shape.

use std::collections::HashSet;
use std::fmt;

use contracts::{
    default_queue_capacity, ContractError, HueSettings, InputsConfig, MqttSettings,
    ProxyBlueprint, RouteConfig, SinkConfig, SinkSettings, SinkType, TelegrafSettings,
    UdpInputConfig,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::parser::RawConfig;

/// Non-fatal configuration finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Migration result
#[derive(Debug, Clone)]
pub struct Migration {
    pub blueprint: ProxyBlueprint,
    pub warnings: Vec<ConfigWarning>,
}

/// Resolve either config shape into the canonical blueprint
///
/// # Errors
/// Unknown sink types and unparseable settings of enabled outputs.
pub fn migrate(raw: RawConfig) -> Result<Migration, ContractError> {
    let mut warnings = Vec::new();

    let udp = migrate_udp(&raw, &mut warnings);

    let mut outputs = raw.outputs.unwrap_or_default();
    let mut routing = raw.routing.unwrap_or_default();

    if let Some(bridge) = raw.hue_bridge {
        warnings.push(ConfigWarning::new(
            "hue_bridge",
            "legacy section migrated to outputs.hue",
        ));
        let entry = outputs
            .entry("hue".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(hue) = entry {
            if let Some(ip) = bridge.ip {
                hue.insert("bridge_ip".into(), Value::String(ip));
            }
            if let Some(username) = bridge.username {
                hue.insert("username".into(), Value::String(username));
            }
            hue.insert("enabled".into(), Value::Bool(true));
        }

        routing
            .entry("ph".to_string())
            .or_insert_with(|| serde_json::json!({ "outputs": ["hue"] }));
    }

    let mut sinks = Vec::with_capacity(outputs.len());
    for (name, value) in outputs {
        if let Some(sink) = migrate_output(name, value, &mut warnings)? {
            sinks.push(sink);
        }
    }

    let routes = routing
        .into_iter()
        .map(|(device_type, value)| {
            let outputs = normalize_route(&device_type, value, &mut warnings);
            RouteConfig {
                device_type,
                outputs,
            }
        })
        .collect();

    Ok(Migration {
        blueprint: ProxyBlueprint {
            inputs: InputsConfig { udp },
            outputs: sinks,
            routing: routes,
        },
        warnings,
    })
}

fn migrate_udp(raw: &RawConfig, warnings: &mut Vec<ConfigWarning>) -> UdpInputConfig {
    let mut udp = UdpInputConfig::default();

    if let Some(nested) = raw.inputs.as_ref().and_then(|inputs| inputs.udp.as_ref()) {
        if let Some(ip) = &nested.ip {
            udp.ip = ip.clone();
        }
        if let Some(ports) = &nested.ports {
            udp.ports = ports.clone();
        }
        if let Some(echo) = nested.echo {
            udp.echo = echo;
        }
    }

    // Legacy section wins, matching how the daemon always treated it
    if let Some(legacy) = &raw.udp_server {
        warnings.push(ConfigWarning::new(
            "udp_server",
            "legacy section migrated to inputs.udp",
        ));
        udp.ip = legacy.ip.clone().unwrap_or_else(|| "0.0.0.0".to_string());
        udp.ports = legacy.ports.clone().unwrap_or_else(|| vec![52001]);
        if let Some(echo) = legacy.echo {
            udp.echo = echo;
        }
    }

    udp
}

fn migrate_output(
    name: String,
    value: Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Result<Option<SinkConfig>, ContractError> {
    let field = format!("outputs.{name}");

    let Value::Object(mut params) = value else {
        warnings.push(ConfigWarning::new(
            field,
            "output is not a mapping, treated as disabled",
        ));
        return Ok(None);
    };

    let type_name = match params.remove("type") {
        None => name.clone(),
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(ContractError::config_validation(
                format!("{field}.type"),
                format!("expected a string, got {other}"),
            ))
        }
    };
    let enabled = match params.remove("enabled") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => b,
        Some(other) => {
            return Err(ContractError::config_validation(
                format!("{field}.enabled"),
                format!("expected a boolean, got {other}"),
            ))
        }
    };
    let queue_capacity = match params.remove("queue_capacity") {
        None | Some(Value::Null) => default_queue_capacity(),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                ContractError::config_validation(
                    format!("{field}.queue_capacity"),
                    format!("expected a non-negative integer, got {value}"),
                )
            })?,
    };

    let settings = match build_settings(&type_name, params) {
        Ok(settings) => settings,
        Err(message) if !enabled => {
            warnings.push(ConfigWarning::new(
                field,
                format!("disabled output skipped: {message}"),
            ));
            return Ok(None);
        }
        Err(message) => return Err(ContractError::config_validation(field, message)),
    };

    Ok(Some(SinkConfig {
        name,
        enabled,
        queue_capacity,
        settings,
    }))
}

fn build_settings(type_name: &str, params: Map<String, Value>) -> Result<SinkSettings, String> {
    let sink_type = SinkType::from_name(type_name)
        .ok_or_else(|| format!("unknown sink type '{type_name}'"))?;

    let params = Value::Object(params);
    Ok(match sink_type {
        SinkType::Hue => SinkSettings::Hue(settings_from::<HueSettings>(params)?),
        SinkType::Mqtt => SinkSettings::Mqtt(settings_from::<MqttSettings>(params)?),
        SinkType::Telegraf => SinkSettings::Telegraf(settings_from::<TelegrafSettings>(params)?),
    })
}

fn settings_from<T: DeserializeOwned>(params: Value) -> Result<T, String> {
    serde_json::from_value(params).map_err(|e| format!("invalid settings: {e}"))
}

/// Normalize one routing entry to an ordered, de-duplicated name list
fn normalize_route(
    device_type: &str,
    value: Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Vec<String> {
    let field = format!("routing.{device_type}");

    let target = match value {
        Value::Object(mut map) => match map.remove("outputs") {
            Some(outputs) => outputs,
            None => {
                warnings.push(ConfigWarning::new(field, "route has no 'outputs' key"));
                return Vec::new();
            }
        },
        other => other,
    };

    let names = match target {
        Value::String(name) => vec![name],
        Value::Array(items) => {
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(name) => names.push(name),
                    other => warnings.push(ConfigWarning::new(
                        field.clone(),
                        format!("ignoring non-string output {other}"),
                    )),
                }
            }
            names
        }
        other => {
            warnings.push(ConfigWarning::new(
                field,
                format!("unsupported route value {other}, route left empty"),
            ));
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
