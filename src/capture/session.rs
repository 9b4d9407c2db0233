//! One capture session: an uninterrupted run of frame production bound to a
//! single frame rate, ending only at a frame boundary.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, instrument};

use crate::capture::frame::{FrameEnvelope, Stamp, FORMAT_JPEG};
use crate::capture::source::{CaptureError, FrameSource};
use crate::engine::EngineShared;
use crate::sink::PublishSink;

/// Why a session ended. Both causes are normal control flow, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Reconfigured,
    ShuttingDown,
}

/// Disposable capture run. Created by the engine for one rate binding and
/// consumed by [`run`](CaptureSession::run); never reused across rate changes.
pub struct CaptureSession<'a> {
    source: &'a mut dyn FrameSource,
    buffer: &'a mut Vec<u8>,
    shared: &'a EngineShared,
    sink: &'a dyn PublishSink,
    bound_rate: f64,
    frame_id: Arc<str>,
}

impl<'a> CaptureSession<'a> {
    pub(crate) fn new(
        source: &'a mut dyn FrameSource,
        buffer: &'a mut Vec<u8>,
        shared: &'a EngineShared,
        sink: &'a dyn PublishSink,
        frame_id: Arc<str>,
    ) -> Self {
        let bound_rate = shared.current_rate();
        Self {
            source,
            buffer,
            shared,
            sink,
            bound_rate,
            frame_id,
        }
    }

    /// Produce and publish frames until a control flag is observed.
    ///
    /// Flags are checked only between frames; a capture in flight always
    /// completes, so no partial frame can ever be delivered.
    #[instrument(skip_all, fields(rate = self.bound_rate))]
    pub fn run(mut self) -> Result<SessionEnd, CaptureError> {
        debug!("session started");

        loop {
            if self.shared.shutting_down() {
                return Ok(SessionEnd::ShuttingDown);
            }
            if self.shared.reconfig_requested() {
                return Ok(SessionEnd::Reconfigured);
            }

            debug_assert!(self.buffer.is_empty(), "frame buffer not drained");

            // The sole blocking point of the capture agent.
            self.source.capture_frame(self.buffer)?;

            let frame = FrameEnvelope {
                data: Bytes::copy_from_slice(self.buffer),
                format: FORMAT_JPEG,
                stamp: Stamp::now(),
                frame_id: Arc::clone(&self.frame_id),
            };
            self.sink.publish(frame);

            // Restore the empty-buffer invariant before the next capture.
            self.buffer.clear();

            if self.shared.latch_first_publish() {
                info!("published the first frame");
            }

            // Scheduling courtesy when the hardware call applies no
            // backpressure of its own.
            thread::sleep(Duration::from_millis(1));
        }
    }
}
