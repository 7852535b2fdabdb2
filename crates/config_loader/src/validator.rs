//! Configuration validation module
//!
//! Fatal rules:
//! - at least one UDP port, no duplicates, bind ip parses
//! - output names non-empty and unique
//! - queue_capacity > 0
//! - required sink settings present, timeouts and backoff intervals > 0
//! - mqtt topic prefix and aliases free of wildcards, credentials paired
//!
//! Non-fatal warnings: routes naming unknown or disabled outputs, empty
//! routes, no routes, no enabled outputs.

use std::collections::HashSet;
use std::net::IpAddr;

use contracts::{ContractError, MqttSettings, ProxyBlueprint, SinkSettings};

use crate::ConfigWarning;

/// Validate ProxyBlueprint
///
/// Returns the first fatal error, otherwise the list of warnings.
pub fn validate(blueprint: &ProxyBlueprint) -> Result<Vec<ConfigWarning>, ContractError> {
    validate_inputs(blueprint)?;
    validate_outputs(blueprint)?;
    Ok(routing_warnings(blueprint))
}

/// Validate UDP listener section
fn validate_inputs(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    let udp = &blueprint.inputs.udp;

    if udp.ip.parse::<IpAddr>().is_err() {
        return Err(ContractError::config_validation(
            "inputs.udp.ip",
            format!("'{}' is not an ip address", udp.ip),
        ));
    }

    if udp.ports.is_empty() {
        return Err(ContractError::config_validation(
            "inputs.udp.ports",
            "at least one port is required",
        ));
    }

    let mut seen = HashSet::new();
    for port in &udp.ports {
        if !seen.insert(port) {
            return Err(ContractError::config_validation(
                "inputs.udp.ports",
                format!("duplicate port {port}"),
            ));
        }
    }
    Ok(())
}

/// Validate output sinks
fn validate_outputs(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.outputs.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("outputs[{idx}].name"),
                "output name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("outputs.{}", sink.name),
                "duplicate output name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("outputs.{}.queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }

        let field = format!("outputs.{}", sink.name);
        match &sink.settings {
            SinkSettings::Hue(hue) => {
                require_non_empty(&field, "bridge_ip", &hue.bridge_ip)?;
                require_non_empty(&field, "username", &hue.username)?;
                if hue.timeout_ms == 0 {
                    return Err(ContractError::config_validation(
                        format!("{field}.timeout_ms"),
                        "timeout_ms must be > 0",
                    ));
                }
            }
            SinkSettings::Mqtt(mqtt) => validate_mqtt(&field, mqtt)?,
            SinkSettings::Telegraf(telegraf) => {
                require_non_empty(&field, "host", &telegraf.host)?;
            }
        }
    }
    Ok(())
}

fn validate_mqtt(field: &str, mqtt: &MqttSettings) -> Result<(), ContractError> {
    require_non_empty(field, "host", &mqtt.host)?;
    require_non_empty(field, "topic_prefix", &mqtt.topic_prefix)?;
    require_non_empty(field, "client_id", &mqtt.client_id)?;

    if has_wildcard(&mqtt.topic_prefix) {
        return Err(ContractError::config_validation(
            format!("{field}.topic_prefix"),
            "topic prefix must not contain '+' or '#'",
        ));
    }
    for (device_type, name) in &mqtt.topic_names {
        if name.is_empty() || has_wildcard(name) || name.contains('/') {
            return Err(ContractError::config_validation(
                format!("{field}.topic_names.{device_type}"),
                "topic name must be a single non-wildcard level",
            ));
        }
    }

    if mqtt.username.is_some() != mqtt.password.is_some() {
        return Err(ContractError::config_validation(
            format!("{field}.username"),
            "username and password must be set together",
        ));
    }

    let retry = &mqtt.retry;
    if retry.short_interval_secs == 0 || retry.long_interval_secs == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.retry"),
            "backoff intervals must be > 0",
        ));
    }
    if mqtt.keepalive_secs == 0 {
        return Err(ContractError::config_validation(
            format!("{field}.keepalive_secs"),
            "keepalive_secs must be > 0",
        ));
    }
    Ok(())
}

fn require_non_empty(field: &str, key: &str, value: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        return Err(ContractError::config_validation(
            format!("{field}.{key}"),
            format!("{key} cannot be empty"),
        ));
    }
    Ok(())
}

fn has_wildcard(topic: &str) -> bool {
    topic.contains('+') || topic.contains('#')
}

/// Collect routing warnings
fn routing_warnings(blueprint: &ProxyBlueprint) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if blueprint.enabled_outputs().next().is_none() {
        warnings.push(ConfigWarning::new("outputs", "no enabled outputs"));
    }
    if blueprint.routing.is_empty() {
        warnings.push(ConfigWarning::new(
            "routing",
            "no routes, every event is dropped",
        ));
    }

    for route in &blueprint.routing {
        let field = format!("routing.{}", route.device_type);
        if route.outputs.is_empty() {
            warnings.push(ConfigWarning::new(field.clone(), "route has no outputs"));
        }
        for name in &route.outputs {
            match blueprint.output(name) {
                None => warnings.push(ConfigWarning::new(
                    field.clone(),
                    format!("unknown output '{name}'"),
                )),
                Some(output) if !output.enabled => warnings.push(ConfigWarning::new(
                    field.clone(),
                    format!("output '{name}' is disabled"),
                )),
                Some(_) => {}
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        HueSettings, InputsConfig, RouteConfig, SinkConfig, TelegrafSettings, UdpInputConfig,
    };

    fn minimal_blueprint() -> ProxyBlueprint {
        ProxyBlueprint {
            inputs: InputsConfig {
                udp: UdpInputConfig::default(),
            },
            outputs: vec![
                SinkConfig {
                    name: "hue".into(),
                    enabled: true,
                    queue_capacity: 100,
                    settings: SinkSettings::Hue(HueSettings {
                        bridge_ip: "192.168.1.10".into(),
                        username: "abc".into(),
                        timeout_ms: 5000,
                    }),
                },
                SinkConfig {
                    name: "mqtt".into(),
                    enabled: true,
                    queue_capacity: 100,
                    settings: SinkSettings::Mqtt(MqttSettings::default()),
                },
            ],
            routing: vec![RouteConfig {
                device_type: "ph".into(),
                outputs: vec!["hue".into(), "mqtt".into()],
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        let warnings = validate(&minimal_blueprint()).unwrap();
        assert!(warnings.is_empty(), "got: {warnings:?}");
    }

    #[test]
    fn test_no_ports() {
        let mut bp = minimal_blueprint();
        bp.inputs.udp.ports.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("at least one port"), "got: {err}");
    }

    #[test]
    fn test_duplicate_port() {
        let mut bp = minimal_blueprint();
        bp.inputs.udp.ports = vec![52001, 52001];
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate port"), "got: {err}");
    }

    #[test]
    fn test_invalid_ip() {
        let mut bp = minimal_blueprint();
        bp.inputs.udp.ip = "not-an-ip".into();
        assert!(validate(&bp).is_err());
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = minimal_blueprint();
        bp.outputs[0].queue_capacity = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("queue_capacity"), "got: {err}");
    }

    #[test]
    fn test_duplicate_output_name() {
        let mut bp = minimal_blueprint();
        bp.outputs[1].name = "hue".into();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate output name"), "got: {err}");
    }

    #[test]
    fn test_topic_prefix_wildcard() {
        let mut bp = minimal_blueprint();
        let mut mqtt = MqttSettings::default();
        mqtt.topic_prefix = "loxone/#".into();
        bp.outputs[1].settings = SinkSettings::Mqtt(mqtt);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("topic_prefix"), "got: {err}");
    }

    #[test]
    fn test_mqtt_credentials_come_in_pairs() {
        let mut bp = minimal_blueprint();
        let mut mqtt = MqttSettings::default();
        mqtt.username = Some("loxone".into());
        bp.outputs[1].settings = SinkSettings::Mqtt(mqtt.clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("password"), "got: {err}");

        mqtt.password = Some("secret".into());
        bp.outputs[1].settings = SinkSettings::Mqtt(mqtt);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_backoff_interval() {
        let mut bp = minimal_blueprint();
        let mut mqtt = MqttSettings::default();
        mqtt.retry.short_interval_secs = 0;
        bp.outputs[1].settings = SinkSettings::Mqtt(mqtt);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("backoff"), "got: {err}");
    }

    #[test]
    fn test_empty_telegraf_host() {
        let mut bp = minimal_blueprint();
        bp.outputs[0].settings = SinkSettings::Telegraf(TelegrafSettings {
            host: String::new(),
            port: 8094,
        });
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_routing_warnings() {
        let mut bp = minimal_blueprint();
        bp.outputs[1].enabled = false;
        bp.routing.push(RouteConfig {
            device_type: "pm".into(),
            outputs: vec!["telegraf".into()],
        });
        bp.routing.push(RouteConfig {
            device_type: "px".into(),
            outputs: vec![],
        });

        let warnings = validate(&bp).unwrap();
        let text: Vec<String> = warnings.iter().map(ToString::to_string).collect();
        assert_eq!(warnings.len(), 3, "got: {text:?}");
        assert!(text.iter().any(|w| w.contains("'mqtt' is disabled")));
        assert!(text.iter().any(|w| w.contains("unknown output 'telegraf'")));
        assert!(text.iter().any(|w| w.contains("no outputs")));
    }

    #[test]
    fn test_empty_config_warnings() {
        let warnings = validate(&ProxyBlueprint::default()).unwrap();
        assert_eq!(warnings.len(), 2);
    }
}
