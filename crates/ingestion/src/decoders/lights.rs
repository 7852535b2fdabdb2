//! `ph` lighting decoder
//!
//! The tail is exactly nine ASCII digits:
//!
//! ```text
//! RGB:  BBB GGG RRR      e.g. 100 050 025
//! CCT:  2 BBBB KKKK      e.g. 2 0100 3000
//! ```
//!
//! A leading `2` selects CCT; RGB channels never exceed `100`, so the first
//! RGB digit is always `0` or `1`.

use contracts::{CctState, DecodeError, DevicePayload, RgbState};

const TAIL_LEN: usize = 9;
const CCT_MARKER: u8 = b'2';

const PERCENT_MAX: u32 = 100;
const KELVIN_MIN: u32 = 2700;
const KELVIN_MAX: u32 = 6500;

/// Decode a `ph` tail
pub fn decode_ph(_device_id: u32, tail: &str) -> Result<DevicePayload, DecodeError> {
    if tail.len() != TAIL_LEN || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::malformed_payload(
            "ph",
            format!("expected {TAIL_LEN} digits, got {tail:?}"),
        ));
    }

    if tail.as_bytes()[0] == CCT_MARKER {
        let brightness = ranged("brightness", &tail[1..5], 0, PERCENT_MAX)?;
        let kelvin = ranged("kelvin", &tail[5..9], KELVIN_MIN, KELVIN_MAX)?;
        Ok(DevicePayload::Cct(CctState {
            brightness: brightness as u8,
            kelvin: kelvin as u16,
        }))
    } else {
        Ok(DevicePayload::Rgb(RgbState {
            blue: ranged("blue", &tail[0..3], 0, PERCENT_MAX)? as u8,
            green: ranged("green", &tail[3..6], 0, PERCENT_MAX)? as u8,
            red: ranged("red", &tail[6..9], 0, PERCENT_MAX)? as u8,
        }))
    }
}

/// Parse an all-digit slice and check it against `[min, max]`
fn ranged(field: &'static str, digits: &str, min: u32, max: u32) -> Result<u32, DecodeError> {
    let value = digits
        .parse::<u32>()
        .map_err(|e| DecodeError::malformed_payload("ph", format!("{field}: {e}")))?;
    if value < min || value > max {
        return Err(DecodeError::ValueOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_rgb(rgb: &RgbState) -> String {
        format!("{:03}{:03}{:03}", rgb.blue, rgb.green, rgb.red)
    }

    #[test]
    fn test_rgb() {
        assert_eq!(
            decode_ph(9, "100050025").unwrap(),
            DevicePayload::Rgb(RgbState {
                blue: 100,
                green: 50,
                red: 25
            })
        );
    }

    #[test]
    fn test_cct() {
        assert_eq!(
            decode_ph(9, "201003000").unwrap(),
            DevicePayload::Cct(CctState {
                brightness: 100,
                kelvin: 3000
            })
        );
        assert_eq!(
            decode_ph(9, "200002700").unwrap(),
            DevicePayload::Cct(CctState {
                brightness: 0,
                kelvin: 2700
            })
        );
    }

    #[test]
    fn test_rgb_reencodes_to_original_tail() {
        for blue in (0..=100).step_by(7) {
            for green in (0..=100).step_by(11) {
                for red in [0, 1, 50, 99, 100] {
                    let tail = format!("{blue:03}{green:03}{red:03}");
                    let DevicePayload::Rgb(rgb) = decode_ph(1, &tail).unwrap() else {
                        panic!("{tail} did not decode as rgb");
                    };
                    assert_eq!(encode_rgb(&rgb), tail);
                }
            }
        }
    }

    #[test]
    fn test_cct_valid_range() {
        for kelvin in [2700, 3000, 4000, 6500] {
            for brightness in [0, 1, 50, 100] {
                let tail = format!("2{brightness:04}{kelvin:04}");
                assert!(decode_ph(1, &tail).is_ok(), "{tail}");
            }
        }
    }

    #[test]
    fn test_cct_kelvin_out_of_range() {
        for tail in ["201002699", "201006501"] {
            let err = decode_ph(1, tail).unwrap_err();
            assert!(
                matches!(err, DecodeError::ValueOutOfRange { field: "kelvin", .. }),
                "{tail} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_cct_brightness_out_of_range() {
        let err = decode_ph(1, "201013000").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ValueOutOfRange {
                field: "brightness",
                value: 101,
                ..
            }
        ));
    }

    #[test]
    fn test_rgb_channel_out_of_range() {
        let err = decode_ph(1, "101000000").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ValueOutOfRange { field: "blue", .. }
        ));
        let err = decode_ph(1, "000000150").unwrap_err();
        assert!(matches!(
            err,
            DecodeError::ValueOutOfRange { field: "red", .. }
        ));
    }

    #[test]
    fn test_malformed_tail() {
        for tail in ["", "10005002", "1000500250", "10005002x", "+10050025", "１00050025"] {
            let err = decode_ph(1, tail).unwrap_err();
            assert!(
                matches!(err, DecodeError::MalformedPayload { .. }),
                "{tail:?} gave {err:?}"
            );
        }
    }
}
