//! `pm` power meter decoder
//!
//! The upstream format is not finalized. The tail is wrapped verbatim and
//! no structure is inferred.

use contracts::{DecodeError, DevicePayload, PowerReading};

/// Decode a `pm` tail
pub fn decode_pm(_device_id: u32, tail: &str) -> Result<DevicePayload, DecodeError> {
    Ok(DevicePayload::Power(PowerReading {
        raw_value: tail.to_string(),
    }))
}
