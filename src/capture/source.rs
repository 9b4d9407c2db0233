//! Hardware frame source boundary.
//!
//! The capture loop talks to the camera through [`FrameSource`] only; the
//! production implementation is V4L2 with memory-mapped buffers.

use std::io;

use thiserror::Error;
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::CaptureConfig;

const BUFFER_COUNT: u32 = 4;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to acquire capture device {path}: {source}")]
    Acquire {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("device does not support video capture")]
    NotACaptureDevice,
    #[error("capture stream not active")]
    StreamInactive,
    #[error("hardware capture failed: {0}")]
    Capture(#[source] io::Error),
    #[error("failed to apply frame rate {rate}: {source}")]
    RateChange {
        rate: f64,
        #[source]
        source: io::Error,
    },
}

/// Boundary to the camera hardware.
///
/// One blocking call per frame; the encoded bytes land in the caller's
/// reusable buffer. Dropping the source releases the hardware.
pub trait FrameSource: Send {
    /// Block until the hardware delivers one complete encoded frame, then
    /// append its bytes to `buf`. `buf` is empty on entry.
    fn capture_frame(&mut self, buf: &mut Vec<u8>) -> Result<(), CaptureError>;

    /// Reconfigure the hardware frame rate. Called only between capture
    /// sessions, never while a capture is in flight.
    fn set_frame_rate(&mut self, rate: f64) -> Result<(), CaptureError>;
}

/// V4L2 capture with memory-mapped buffers
pub struct V4l2Source {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    sequence: u64,
}

impl V4l2Source {
    /// Acquire the device and start streaming at `rate` frames per second.
    /// Failure here means the node cannot run at all.
    pub fn open(config: &CaptureConfig, rate: f64) -> Result<Self, CaptureError> {
        info!(device = %config.device, "acquiring camera");

        let acquire = |source| CaptureError::Acquire {
            path: config.device.clone(),
            source,
        };

        let device = Device::with_path(&config.device).map_err(acquire)?;

        let caps = device.query_caps().map_err(acquire)?;
        info!("device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::NotACaptureDevice);
        }

        let mut fmt = device.format().map_err(acquire)?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");
        device.set_format(&fmt).map_err(acquire)?;

        device
            .set_params(&Parameters::with_fps(rate.round() as u32))
            .map_err(|source| CaptureError::RateChange { rate, source })?;

        let device = Box::new(device);
        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(CaptureError::Capture)?;
        info!("capture stream started with {} buffers", BUFFER_COUNT);

        Ok(Self {
            device,
            stream: Some(stream),
            sequence: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    fn capture_frame(&mut self, buf: &mut Vec<u8>) -> Result<(), CaptureError> {
        let stream = self.stream.as_mut().ok_or(CaptureError::StreamInactive)?;

        // Blocking dequeue; only meta.bytesused bytes hold the encoded frame.
        let (data, meta) = stream.next().map_err(CaptureError::Capture)?;
        let used = (meta.bytesused as usize).min(data.len());
        buf.extend_from_slice(&data[..used]);

        self.sequence += 1;
        debug!(seq = self.sequence, bytes = used, "frame dequeued");
        Ok(())
    }

    fn set_frame_rate(&mut self, rate: f64) -> Result<(), CaptureError> {
        // The stream must be torn down before S_PARM and rebuilt after.
        self.stream = None;

        self.device
            .set_params(&Parameters::with_fps(rate.round() as u32))
            .map_err(|source| CaptureError::RateChange { rate, source })?;

        let stream = MmapStream::with_buffers(&self.device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(CaptureError::Capture)?;
        self.stream = Some(stream);
        Ok(())
    }
}
