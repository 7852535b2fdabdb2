//! RawFrame - FrameDecoder output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One UDP datagram split into its fields
///
/// No device-type interpretation has happened yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Local receive time
    pub received_at: DateTime<Utc>,

    /// Controller-reported timestamp, verbatim (e.g. "2025-07-18 12:03:06")
    pub timestamp: String,

    /// Source tag (e.g. "udplight"), may be empty
    pub source: String,

    /// Opaque data field (e.g. "ph9.100050025")
    pub data: String,
}
