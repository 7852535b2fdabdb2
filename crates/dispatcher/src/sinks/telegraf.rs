//! MetricsSink - Telegraf line protocol over UDP
//!
//! ```text
//! ph,device_id=9 red=25i,green=50i,blue=100i,mode="rgb" 1752840186000000000
//! ```
//!
//! Fire-and-forget: a failed send is reported once and never retried.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use contracts::{
    Ack, ContractError, DeviceEvent, DevicePayload, Sink, SinkError, TelegrafSettings,
};
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, instrument, trace};

use crate::error::DispatcherError;

/// Sink that writes line protocol records to a Telegraf socket listener
pub struct MetricsSink {
    name: String,
    target: SocketAddr,
    socket: Option<UdpSocket>,
}

impl MetricsSink {
    /// Resolve the target and open a connected UDP socket
    #[instrument(
        name = "metrics_sink_new",
        skip(name, settings),
        fields(host = %settings.host, port = settings.port)
    )]
    pub async fn new(
        name: impl Into<String>,
        settings: &TelegrafSettings,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let target = lookup_host((settings.host.as_str(), settings.port))
            .await?
            .next()
            .ok_or_else(|| {
                ContractError::config_validation(
                    "telegraf.host",
                    format!("'{}' did not resolve", settings.host),
                )
            })?;

        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        debug!(sink = %name, target = %target, "MetricsSink connected");
        Ok(Self {
            name,
            target,
            socket: Some(socket),
        })
    }

    /// Create from settings (for factory)
    pub async fn from_settings(
        name: impl Into<String>,
        settings: &TelegrafSettings,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        Self::new(name.clone(), settings)
            .await
            .map_err(|e| DispatcherError::sink_creation(name, e.to_string()))
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl Sink for MetricsSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "metrics_sink_send",
        skip(self, event),
        fields(sink = %self.name, device_id = event.device_id)
    )]
    async fn send(&mut self, event: &DeviceEvent) -> Result<Ack, SinkError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| SinkError::not_connected(&self.name))?;

        let line = line_protocol(event);
        let sent = socket
            .send(line.as_bytes())
            .await
            .map_err(|e| SinkError::delivery_failed(&self.name, e.to_string()))?;

        trace!(sink = %self.name, bytes = sent, line = %line, "Sent");
        Ok(Ack::Delivered)
    }

    #[instrument(name = "metrics_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), SinkError> {
        self.socket = None;
        debug!(sink = %self.name, "MetricsSink closed");
        Ok(())
    }
}

/// Format one event as a line protocol record
///
/// The timestamp is the frame receive time; it is left out when it does not
/// fit in `i64` nanoseconds and Telegraf stamps the record itself.
pub fn line_protocol(event: &DeviceEvent) -> String {
    let fields = match &event.payload {
        DevicePayload::Rgb(rgb) => format!(
            "red={}i,green={}i,blue={}i,mode=\"rgb\"",
            rgb.red, rgb.green, rgb.blue
        ),
        DevicePayload::Cct(cct) => format!(
            "brightness={}i,kelvin={}i,mode=\"cct\"",
            cct.brightness, cct.kelvin
        ),
        DevicePayload::Power(power) => format!("raw={}", string_field(&power.raw_value)),
    };

    let mut line = format!(
        "{},device_id={} {}",
        escape_measurement(&event.device_type),
        event.device_id,
        fields
    );
    if let Some(nanos) = event.received_at.timestamp_nanos_opt() {
        line.push(' ');
        line.push_str(&nanos.to_string());
    }
    line
}

/// Spaces and commas must be escaped with backslash
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Quoted string field, inner quotes and backslashes escaped
fn string_field(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
