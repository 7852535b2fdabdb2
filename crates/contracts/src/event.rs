//! DeviceEvent - DeviceHandlerRegistry output
//!
//! A frame after device-type specific decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded device event
///
/// `device_type` is always a prefix registered with the decoder registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Registered device-type prefix (e.g. "ph")
    pub device_type: String,

    /// Device id digits following the prefix
    pub device_id: u32,

    /// Typed payload
    pub payload: DevicePayload,

    /// Original data field, forwarded verbatim by the broker sink
    pub raw: String,

    /// Source tag copied from the frame
    pub source: String,

    /// Frame receive time
    pub received_at: DateTime<Utc>,
}

/// Closed payload variant set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DevicePayload {
    Rgb(RgbState),
    Cct(CctState),
    Power(PowerReading),
}

impl DevicePayload {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rgb(_) => "rgb",
            Self::Cct(_) => "cct",
            Self::Power(_) => "power",
        }
    }
}

/// RGB light state, each channel a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbState {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
}

impl RgbState {
    /// Brightest channel in percent
    pub fn max_channel(&self) -> u8 {
        self.red.max(self.green).max(self.blue)
    }

    /// All channels zero
    pub fn is_off(&self) -> bool {
        self.max_channel() == 0
    }
}

/// Tunable-white light state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CctState {
    /// Brightness percentage 0..=100
    pub brightness: u8,

    /// Colour temperature 2700..=6500
    pub kelvin: u16,
}

/// Power meter reading
///
/// The upstream format is not finalized, so the tail is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerReading {
    pub raw_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_max_channel() {
        let rgb = RgbState {
            blue: 100,
            green: 50,
            red: 25,
        };
        assert_eq!(rgb.max_channel(), 100);
        assert!(!rgb.is_off());
        assert!(RgbState {
            blue: 0,
            green: 0,
            red: 0
        }
        .is_off());
    }

    #[test]
    fn test_payload_serializes_with_mode_tag() {
        let payload = DevicePayload::Cct(CctState {
            brightness: 100,
            kelvin: 3000,
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["mode"], "cct");
        assert_eq!(json["kelvin"], 3000);
        assert_eq!(payload.kind(), "cct");
    }
}
