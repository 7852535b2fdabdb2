//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// loxprox - Loxone UDP telemetry proxy
#[derive(Parser, Debug)]
#[command(
    name = "loxprox",
    author,
    version,
    about = "Loxone UDP telemetry proxy",
    long_about = "Receives `timestamp;source;data` datagrams from a Loxone controller,\n\
                  decodes them into device events and forwards each event to the\n\
                  outputs its device type routes to (Hue bridge, MQTT, Telegraf)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "LOXPROX_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "LOXPROX_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level used when RUST_LOG is unset
    pub fn default_log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the resolved configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (YAML, TOML or JSON)
    #[arg(short, long, default_value = "loxprox.yml", env = "LOXPROX_CONFIG")]
    pub config: PathBuf,

    /// Override the UDP bind address
    #[arg(long, env = "LOXPROX_IP")]
    pub ip: Option<String>,

    /// Override the UDP ports (repeatable)
    #[arg(long = "port", env = "LOXPROX_PORTS", value_delimiter = ',')]
    pub ports: Vec<u16>,

    /// Do not echo datagrams back to the sender
    #[arg(long)]
    pub no_echo: bool,

    /// Stop after this many datagrams (0 = unlimited)
    #[arg(long, default_value = "0", env = "LOXPROX_MAX_PACKETS")]
    pub max_packets: u64,

    /// Capacity of the queue between the UDP receivers and the decoder
    #[arg(long, default_value = "1024", env = "LOXPROX_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "LOXPROX_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "loxprox.yml", env = "LOXPROX_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "loxprox.yml", env = "LOXPROX_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "loxprox", "-v", "run", "-c", "lox.yml", "--port", "52001", "--port", "52002",
            "--no-echo",
        ])
        .unwrap();
        assert_eq!(cli.default_log_level(), "debug");
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("lox.yml"));
        assert_eq!(args.ports, vec![52001, 52002]);
        assert!(args.no_echo);
        assert_eq!(args.metrics_port, 0);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["loxprox", "-q", "-v", "info"]).is_err());
    }
}
