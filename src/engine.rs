//! Streaming engine: owns the camera and the shared control state, and runs
//! capture sessions back to back until shutdown.
//!
//! The control agent never touches the hardware or the raw flags; it goes
//! through an [`EngineHandle`], and every request takes effect at the next
//! frame boundary of the in-flight session.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::capture::session::{CaptureSession, SessionEnd};
use crate::capture::source::{CaptureError, FrameSource};
use crate::sink::PublishSink;

/// Control state shared between the capture agent and the control agent.
///
/// The rate is stored as f32 bits so the whole block stays lock-free; the
/// configured rates are small round numbers, exactly representable.
pub(crate) struct EngineShared {
    rate_bits: AtomicU32,
    reconfig_requested: AtomicBool,
    shutting_down: AtomicBool,
    has_published: AtomicBool,
}

impl EngineShared {
    fn new(rate: f64) -> Self {
        Self {
            rate_bits: AtomicU32::new((rate as f32).to_bits()),
            reconfig_requested: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            has_published: AtomicBool::new(false),
        }
    }

    pub(crate) fn current_rate(&self) -> f64 {
        f32::from_bits(self.rate_bits.load(Ordering::Acquire)) as f64
    }

    pub(crate) fn reconfig_requested(&self) -> bool {
        self.reconfig_requested.load(Ordering::Acquire)
    }

    pub(crate) fn shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Latch the first-publish diagnostic. True exactly once.
    pub(crate) fn latch_first_publish(&self) -> bool {
        !self.has_published.swap(true, Ordering::Relaxed)
    }
}

/// Cheap cloneable handle for the control agent.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<EngineShared>,
}

impl EngineHandle {
    /// Ask the capture agent to rebind to `target` frames per second.
    ///
    /// A no-op when `target` already is the current rate, so the in-flight
    /// session keeps running uninterrupted.
    pub fn request_rate_change(&self, target: f64) {
        let bits = (target as f32).to_bits();
        if self.shared.rate_bits.load(Ordering::Acquire) == bits {
            return;
        }
        // The rate store must be visible before the flag that publishes it.
        self.shared.rate_bits.store(bits, Ordering::Release);
        self.shared.reconfig_requested.store(true, Ordering::Release);
        info!(rate = target, "frame rate change requested");
    }

    /// Ask the capture agent to stop at the next frame boundary. Idempotent.
    pub fn request_shutdown(&self) {
        if !self.shared.shutting_down.swap(true, Ordering::Release) {
            info!("shutdown requested");
        }
    }

    pub fn current_rate(&self) -> f64 {
        self.shared.current_rate()
    }
}

/// Owns the hardware source for the whole capture lifetime and runs
/// successive capture sessions, applying a new frame rate between them.
pub struct StreamingEngine<S> {
    source: S,
    buffer: Vec<u8>,
    shared: Arc<EngineShared>,
    frame_id: Arc<str>,
}

impl<S: FrameSource> StreamingEngine<S> {
    /// `source` must already be configured for `initial_rate`.
    pub fn new(source: S, initial_rate: f64, frame_id: &str) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            shared: Arc::new(EngineShared::new(initial_rate)),
            frame_id: Arc::from(frame_id),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run capture sessions until shutdown is observed at a session boundary.
    ///
    /// Consuming `self` makes a second concurrent start impossible and pins
    /// the hardware release to exactly one point: the drop of `self.source`
    /// when this returns, after the loop has fully exited.
    pub fn start(mut self, sink: &dyn PublishSink) -> Result<(), CaptureError> {
        info!("capture started");

        while !self.shared.shutting_down() {
            let session = CaptureSession::new(
                &mut self.source,
                &mut self.buffer,
                &self.shared,
                sink,
                Arc::clone(&self.frame_id),
            );

            match session.run()? {
                SessionEnd::ShuttingDown => break,
                SessionEnd::Reconfigured => {
                    // Clear before reading the rate: a request landing in
                    // between re-sets the flag and is picked up by the next
                    // session rather than lost.
                    self.shared
                        .reconfig_requested
                        .store(false, Ordering::Release);
                    let target = self.shared.current_rate();
                    info!(rate = target, "applying frame rate");
                    self.source.set_frame_rate(target)?;
                }
            }
        }

        info!("capture ended");
        Ok(())
    }
}
