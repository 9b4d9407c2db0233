//! Downstream frame delivery boundary.

use tracing::warn;

use crate::capture::frame::FrameEnvelope;

/// Where published frames go. Fire-and-forget: implementations must never
/// block the capture loop or report delivery failure back into it.
pub trait PublishSink: Send + Sync {
    fn publish(&self, frame: FrameEnvelope);
}

/// Sink backed by a bounded flume channel, feeding whatever transport drains
/// the receiver. A full or disconnected pipe drops the frame.
pub struct ChannelSink {
    tx: flume::Sender<FrameEnvelope>,
}

impl ChannelSink {
    pub fn new(depth: usize) -> (Self, flume::Receiver<FrameEnvelope>) {
        let (tx, rx) = flume::bounded(depth);
        (Self { tx }, rx)
    }
}

impl PublishSink for ChannelSink {
    fn publish(&self, frame: FrameEnvelope) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(flume::TrySendError::Full(_)) => {
                warn!("frame pipe full, dropping frame");
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                warn!("frame pipe disconnected, dropping frame");
            }
        }
    }
}
