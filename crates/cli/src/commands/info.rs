//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ProxyBlueprint, SinkSettings};
use ingestion::DeviceHandlerRegistry;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    blueprint: &'a ProxyBlueprint,
    supported_device_types: Vec<&'a str>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let registry = DeviceHandlerRegistry::with_defaults();

    if args.json {
        let info = ConfigInfo {
            blueprint: &blueprint,
            supported_device_types: registry.supported_types(),
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, &registry);
    }

    Ok(())
}

/// One-line description of an output's destination
fn describe_settings(settings: &SinkSettings) -> String {
    match settings {
        SinkSettings::Hue(hue) => format!("bridge {}", hue.bridge_ip),
        SinkSettings::Mqtt(mqtt) => format!(
            "{}:{} topic {}/type/<type>",
            mqtt.host, mqtt.port, mqtt.topic_prefix
        ),
        SinkSettings::Telegraf(telegraf) => format!("udp {}:{}", telegraf.host, telegraf.port),
    }
}

fn print_config_info(blueprint: &ProxyBlueprint, registry: &DeviceHandlerRegistry) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  loxprox Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let udp = &blueprint.inputs.udp;
    println!("📥 UDP Input");
    println!("   ├─ Bind: {}", udp.ip);
    println!("   ├─ Ports: {:?}", udp.ports);
    println!("   └─ Echo: {}", udp.echo);

    println!("\n🔌 Device Types");
    println!("   └─ {}", registry.supported_types().join(", "));

    println!("\n📤 Outputs ({})", blueprint.outputs.len());
    for (i, output) in blueprint.outputs.iter().enumerate() {
        let is_last = i == blueprint.outputs.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let state = if output.enabled { "" } else { " [disabled]" };
        println!(
            "   {} {} ({}){} - {}, queue {}",
            prefix,
            output.name,
            output.sink_type(),
            state,
            describe_settings(&output.settings),
            output.queue_capacity
        );
    }

    println!("\n🔀 Routing ({})", blueprint.routing.len());
    for (i, route) in blueprint.routing.iter().enumerate() {
        let is_last = i == blueprint.routing.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let targets = if route.outputs.is_empty() {
            "(none)".to_string()
        } else {
            route.outputs.join(", ")
        };
        println!("   {} {} -> {}", prefix, route.device_type, targets);
    }

    println!();
}
