use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Encoding tag carried by every published frame.
pub const FORMAT_JPEG: &str = "jpeg";

/// Wall-clock timestamp split into whole seconds and nanoseconds,
/// the shape downstream consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub sec: u64,
    pub nanos: u32,
}

impl Stamp {
    /// Stamp taken at frame readout time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        }
    }
}

/// One published frame with zero-copy semantics
#[derive(Debug, Clone)]
pub struct FrameEnvelope {
    /// Immutable encoded frame data - can be shared across threads without copying
    pub data: Bytes,

    /// Encoding tag, always [`FORMAT_JPEG`]
    pub format: &'static str,

    /// Readout timestamp
    pub stamp: Stamp,

    /// Logical identifier of the producing camera
    pub frame_id: Arc<str>,
}
