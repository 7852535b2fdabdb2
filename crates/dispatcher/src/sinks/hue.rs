//! BridgeSink - Philips Hue bridge output
//!
//! One `PUT /api/{username}/lights/{id}/state` per event. Percentages from
//! the controller are translated to Hue units:
//!
//! - RGB: CIE xy through the wide-gamut D65 matrix, `bri` from the brightest
//!   channel
//! - CCT: mired `ct` clamped to what bulbs accept
//! - all channels zero or zero brightness: `{"on": false}`

use std::time::Duration;

use contracts::{
    Ack, CctState, DeviceEvent, DevicePayload, HueSettings, RgbState, Sink, SinkError,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{BridgeError, DispatcherError};

const BRI_MAX: f64 = 254.0;
const CT_MIN: u32 = 153;
const CT_MAX: u32 = 500;

/// Light state body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightCommand {
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
}

impl LightCommand {
    pub fn off() -> Self {
        Self {
            on: false,
            bri: None,
            xy: None,
            ct: None,
        }
    }

    pub fn from_rgb(rgb: &RgbState) -> Self {
        if rgb.is_off() {
            return Self::off();
        }
        let bri = (f64::from(rgb.max_channel()) * BRI_MAX / 100.0).round() as u8;
        Self {
            on: true,
            bri: Some(bri),
            xy: Some(rgb_to_xy(rgb)),
            ct: None,
        }
    }

    pub fn from_cct(cct: &CctState) -> Self {
        // Truncates like the bridge's own integer math
        let bri = (u32::from(cct.brightness) * 254 / 100) as u8;
        if bri == 0 {
            return Self::off();
        }
        let ct = (1_000_000 / u32::from(cct.kelvin.max(1))).clamp(CT_MIN, CT_MAX);
        Self {
            on: true,
            bri: Some(bri),
            xy: None,
            ct: Some(ct as u16),
        }
    }

    /// `None` for payloads a light cannot show
    pub fn from_payload(payload: &DevicePayload) -> Option<Self> {
        match payload {
            DevicePayload::Rgb(rgb) => Some(Self::from_rgb(rgb)),
            DevicePayload::Cct(cct) => Some(Self::from_cct(cct)),
            DevicePayload::Power(_) => None,
        }
    }
}

/// RGB percentages to CIE 1931 xy
pub fn rgb_to_xy(rgb: &RgbState) -> [f64; 2] {
    let r = f64::from(rgb.red) / 100.0;
    let g = f64::from(rgb.green) / 100.0;
    let b = f64::from(rgb.blue) / 100.0;

    let x = r * 0.664511 + g * 0.154324 + b * 0.162028;
    let y = r * 0.283881 + g * 0.668433 + b * 0.047685;
    let z = r * 0.000088 + g * 0.072310 + b * 0.986039;

    let sum = x + y + z;
    if sum == 0.0 {
        return [0.0, 0.0];
    }
    [x / sum, y / sum]
}

/// Light control endpoint
#[trait_variant::make(LightBridge: Send)]
pub trait LocalLightBridge {
    async fn set_light_state(
        &self,
        light_id: u32,
        command: &LightCommand,
    ) -> Result<(), BridgeError>;
}

/// Hue API v1 over HTTP
pub struct HueHttpBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HueHttpBridge {
    pub fn new(settings: &HueSettings) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("http://{}/api/{}", settings.bridge_ip, settings.username),
        })
    }

    pub fn light_url(&self, light_id: u32) -> String {
        format!("{}/lights/{light_id}/state", self.base_url)
    }
}

impl LightBridge for HueHttpBridge {
    async fn set_light_state(
        &self,
        light_id: u32,
        command: &LightCommand,
    ) -> Result<(), BridgeError> {
        let response = self
            .client
            .put(self.light_url(light_id))
            .json(command)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // v1 answers 200 with a list of success/error entries
        let body: Value = response.json().await?;
        match first_error(&body) {
            Some(description) => Err(BridgeError::Rejected(description)),
            None => Ok(()),
        }
    }
}

fn first_error(body: &Value) -> Option<String> {
    body.as_array()?.iter().find_map(|entry| {
        let error = entry.get("error")?;
        Some(
            error
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        )
    })
}

/// Sink that drives lights through a bridge
pub struct BridgeSink<B> {
    name: String,
    bridge: B,
}

impl<B: LightBridge> BridgeSink<B> {
    pub fn new(name: impl Into<String>, bridge: B) -> Self {
        Self {
            name: name.into(),
            bridge,
        }
    }
}

impl BridgeSink<HueHttpBridge> {
    /// Create from settings (for factory)
    #[instrument(
        name = "bridge_sink_from_settings",
        skip(name, settings),
        fields(bridge = %settings.bridge_ip)
    )]
    pub fn from_settings(
        name: impl Into<String>,
        settings: &HueSettings,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let bridge = HueHttpBridge::new(settings)
            .map_err(|e| DispatcherError::sink_creation(&name, e.to_string()))?;
        debug!(sink = %name, bridge = %settings.bridge_ip, "BridgeSink ready");
        Ok(Self::new(name, bridge))
    }
}

impl<B: LightBridge + Sync> Sink for BridgeSink<B> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "bridge_sink_send",
        skip(self, event),
        fields(sink = %self.name, light = event.device_id)
    )]
    async fn send(&mut self, event: &DeviceEvent) -> Result<Ack, SinkError> {
        let Some(command) = LightCommand::from_payload(&event.payload) else {
            return Ok(Ack::Ignored);
        };
        self.bridge
            .set_light_state(event.device_id, &command)
            .await
            .map_err(|e| SinkError::delivery_failed(&self.name, e.to_string()))?;
        debug!(sink = %self.name, light = event.device_id, ?command, "Light updated");
        Ok(Ack::Delivered)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
