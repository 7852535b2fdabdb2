//! FrameDecoder
//!
//! Pure syntactic split of one datagram into `timestamp;source;data`.

use chrono::{DateTime, Utc};
use contracts::{DecodeError, RawFrame};

/// Frame decoder
///
/// Carries no device-type knowledge; see `DeviceHandlerRegistry` for that.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decode one UDP payload
    ///
    /// Surrounding whitespace (including the controller's trailing newline)
    /// is trimmed. Fields past the third are ignored.
    ///
    /// # Errors
    /// `MalformedFrame` for non UTF-8 payloads or fewer than three fields.
    pub fn decode(payload: &[u8], received_at: DateTime<Utc>) -> Result<RawFrame, DecodeError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| DecodeError::malformed_frame(format!("payload is not utf-8: {e}")))?;

        let mut fields = text.trim().split(';');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(timestamp), Some(source), Some(data)) => Ok(RawFrame {
                received_at,
                timestamp: timestamp.to_string(),
                source: source.to_string(),
                data: data.to_string(),
            }),
            _ => Err(DecodeError::malformed_frame(format!(
                "expected 'timestamp;source;data', got {:?}",
                text.trim()
            ))),
        }
    }
}
