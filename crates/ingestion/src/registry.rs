//! DeviceHandlerRegistry
//!
//! Maps a device-type prefix to a [`Decoder`]. Adding a device type means
//! registering one decoder; `dispatch` never changes.

use std::collections::BTreeMap;

use contracts::{DecodeError, DeviceEvent, DevicePayload, RawFrame};
use tracing::debug;

use crate::decoders;
use crate::error::RegistryError;

/// Device-specific decoding capability: `(device_id, tail) -> payload`
pub trait Decoder: Send + Sync {
    fn decode(&self, device_id: u32, tail: &str) -> Result<DevicePayload, DecodeError>;
}

impl<F> Decoder for F
where
    F: Fn(u32, &str) -> Result<DevicePayload, DecodeError> + Send + Sync,
{
    fn decode(&self, device_id: u32, tail: &str) -> Result<DevicePayload, DecodeError> {
        self(device_id, tail)
    }
}

/// Prefix -> decoder lookup table
///
/// Registered prefixes never overlap, so at most one matches any data field.
#[derive(Default)]
pub struct DeviceHandlerRegistry {
    decoders: BTreeMap<String, Box<dyn Decoder>>,
}

impl DeviceHandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `ph` and `pm` decoders
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (prefix, decoder) in decoders::builtin() {
            // Built-in prefixes are distinct and non-overlapping
            if let Err(err) = registry.register_boxed(prefix, decoder) {
                tracing::error!(error = %err, "built-in decoder rejected");
            }
        }
        registry
    }

    /// Register a decoder for a prefix
    ///
    /// # Errors
    /// Empty, non-lowercase, duplicate or overlapping prefixes.
    pub fn register(
        &mut self,
        prefix: impl Into<String>,
        decoder: impl Decoder + 'static,
    ) -> Result<(), RegistryError> {
        self.register_boxed(prefix.into(), Box::new(decoder))
    }

    fn register_boxed(
        &mut self,
        prefix: String,
        decoder: Box<dyn Decoder>,
    ) -> Result<(), RegistryError> {
        if prefix.is_empty() {
            return Err(RegistryError::EmptyPrefix);
        }
        if !prefix.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(RegistryError::InvalidPrefix { prefix });
        }
        if self.decoders.contains_key(&prefix) {
            return Err(RegistryError::Duplicate { prefix });
        }
        if let Some(existing) = self
            .decoders
            .keys()
            .find(|existing| existing.starts_with(&prefix) || prefix.starts_with(existing.as_str()))
        {
            return Err(RegistryError::Overlapping {
                existing: existing.clone(),
                prefix,
            });
        }

        debug!(prefix = %prefix, "registered device decoder");
        self.decoders.insert(prefix, decoder);
        Ok(())
    }

    /// Decode a frame into a typed event
    ///
    /// # Errors
    /// `UnknownDeviceType` when no prefix matches, `MalformedPayload` for a
    /// missing `.`, bad id or empty tail, plus whatever the decoder reports.
    pub fn dispatch(&self, frame: &RawFrame) -> Result<DeviceEvent, DecodeError> {
        let data = frame.data.as_str();
        let (head, tail) = match data.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (data, None),
        };

        let (prefix, decoder) = self
            .decoders
            .iter()
            .find(|(prefix, _)| head.starts_with(prefix.as_str()))
            .ok_or_else(|| DecodeError::UnknownDeviceType {
                data: data.to_string(),
            })?;

        let tail = tail.ok_or_else(|| {
            DecodeError::malformed_payload(prefix.as_str(), "missing '.' separator")
        })?;

        let id_digits = &head[prefix.len()..];
        if id_digits.is_empty() || !id_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecodeError::malformed_payload(
                prefix.as_str(),
                format!("invalid device id {id_digits:?}"),
            ));
        }
        let device_id = id_digits.parse::<u32>().map_err(|e| {
            DecodeError::malformed_payload(prefix.as_str(), format!("device id: {e}"))
        })?;

        if tail.is_empty() {
            return Err(DecodeError::malformed_payload(prefix.as_str(), "empty tail"));
        }

        let payload = decoder.decode(device_id, tail)?;

        Ok(DeviceEvent {
            device_type: prefix.clone(),
            device_id,
            payload,
            raw: frame.data.clone(),
            source: frame.source.clone(),
            received_at: frame.received_at,
        })
    }

    /// Registered device types, sorted
    pub fn supported_types(&self) -> Vec<&str> {
        self.decoders.keys().map(String::as_str).collect()
    }

    /// Whether a prefix is registered
    pub fn is_registered(&self, prefix: &str) -> bool {
        self.decoders.contains_key(prefix)
    }
}

impl std::fmt::Debug for DeviceHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandlerRegistry")
            .field("prefixes", &self.supported_types())
            .finish()
    }
}
