pub mod frame;
pub mod session;
pub mod source;

pub use frame::FrameEnvelope;
pub use session::{CaptureSession, SessionEnd};
pub use source::{CaptureError, FrameSource, V4l2Source};
