//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ProxyBlueprint;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let loaded = config_loader::ConfigLoader::load_with_warnings(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    for warning in &loaded.warnings {
        warn!(field = %warning.field, "{}", warning.message);
    }

    let mut blueprint = loaded.blueprint;
    apply_overrides(&mut blueprint, args)?;

    info!(
        ip = %blueprint.inputs.udp.ip,
        ports = ?blueprint.inputs.udp.ports,
        echo = blueprint.inputs.udp.echo,
        outputs = blueprint.enabled_outputs().count(),
        routes = blueprint.routing.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        max_packets: (args.max_packets > 0).then_some(args.max_packets),
        channel_capacity: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    info!("Starting proxy...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Proxy execution failed")?;

    info!(
        datagrams = stats.datagrams,
        events = stats.events_decoded,
        decode_errors = stats.decode_errors,
        duration_secs = stats.duration.as_secs_f64(),
        "Proxy stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command-line overrides and re-check the result
fn apply_overrides(blueprint: &mut ProxyBlueprint, args: &RunArgs) -> Result<()> {
    let udp = &mut blueprint.inputs.udp;
    if let Some(ref ip) = args.ip {
        info!(ip = %ip, "Overriding UDP bind address from CLI");
        udp.ip = ip.clone();
    }
    if !args.ports.is_empty() {
        info!(ports = ?args.ports, "Overriding UDP ports from CLI");
        udp.ports = args.ports.clone();
    }
    if args.no_echo {
        udp.echo = false;
    }

    config_loader::validate(blueprint).map_err(|e| CliError::invalid_override(e.to_string()))?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &ProxyBlueprint) {
    let udp = &blueprint.inputs.udp;
    println!("\n=== Configuration Summary ===\n");
    println!("UDP input:");
    println!("  Bind: {} ports {:?}", udp.ip, udp.ports);
    println!("  Echo: {}", udp.echo);

    println!("\nOutputs ({}):", blueprint.outputs.len());
    for output in &blueprint.outputs {
        let state = if output.enabled { "" } else { " [disabled]" };
        println!("  - {} ({}){}", output.name, output.sink_type(), state);
    }

    println!("\nRouting ({}):", blueprint.routing.len());
    for route in &blueprint.routing {
        println!("  - {} -> {}", route.device_type, route.outputs.join(", "));
    }

    println!();
}
