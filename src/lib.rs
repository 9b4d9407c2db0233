pub mod calibration;
pub mod capture;
pub mod control;
pub mod engine;
pub mod sink;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub capture: CaptureConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Rate bound at startup and whenever the control plane prefers high.
    pub framerate_high: f64,
    pub framerate_low: f64,
    /// Logical identifier stamped on every published frame.
    pub frame_id: String,
    /// Depth of the outbound frame pipe.
    pub frame_queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Directory calibration files are written to. Must be supplied
    /// explicitly; there is no implicit fleet-root fallback.
    pub dir: PathBuf,
    pub camera_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                device: "/dev/video0".into(),
                width: 640,
                height: 480,
                framerate_high: 30.0,
                framerate_low: 15.0,
                frame_id: "camera_optical_frame".into(),
                frame_queue_depth: 8,
            },
            calibration: CalibrationConfig {
                dir: "./calibrations".into(),
                camera_name: "camera_node".into(),
            },
        }
    }
}
