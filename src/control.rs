//! Control-plane boundary: maps inbound requests onto engine operations and
//! calibration persistence.

use flume::Receiver;
use tracing::{debug, warn};

use crate::calibration::{CalibrationParameters, CalibrationPersister, CalibrationResponse};
use crate::engine::EngineHandle;

/// Inbound control requests.
pub enum ControlRequest {
    /// Prefer the high frame rate when true, the low one otherwise.
    RateSwitch(bool),
    /// Stop capturing and let the process wind down.
    Shutdown,
    /// Persist calibration for `target`; the outcome goes back on `reply`.
    SaveCalibration {
        params: CalibrationParameters,
        target: String,
        reply: flume::Sender<CalibrationResponse>,
    },
}

/// Thin dispatcher between the control channel and the engine. Calibration
/// saves run here, on the control agent, so they can never stall capture.
pub struct ControlSurface {
    engine: EngineHandle,
    persister: CalibrationPersister,
    framerate_high: f64,
    framerate_low: f64,
}

impl ControlSurface {
    pub fn new(
        engine: EngineHandle,
        persister: CalibrationPersister,
        framerate_high: f64,
        framerate_low: f64,
    ) -> Self {
        Self {
            engine,
            persister,
            framerate_high,
            framerate_low,
        }
    }

    /// Drain requests until the channel closes or shutdown arrives.
    pub async fn run(self, requests: Receiver<ControlRequest>) {
        while let Ok(request) = requests.recv_async().await {
            if !self.handle_request(request) {
                break;
            }
        }
        debug!("control surface stopped");
    }

    /// Dispatch one request; false means stop serving.
    fn handle_request(&self, request: ControlRequest) -> bool {
        match request {
            ControlRequest::RateSwitch(prefer_high) => {
                let target = if prefer_high {
                    self.framerate_high
                } else {
                    self.framerate_low
                };
                self.engine.request_rate_change(target);
                true
            }
            ControlRequest::Shutdown => {
                self.engine.request_shutdown();
                false
            }
            ControlRequest::SaveCalibration {
                params,
                target,
                reply,
            } => {
                let response = self.persister.save(&params, &target);
                if reply.try_send(response).is_err() {
                    warn!("calibration requester went away before the reply");
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::source::{CaptureError, FrameSource};
    use crate::engine::StreamingEngine;

    struct NoopSource;

    impl FrameSource for NoopSource {
        fn capture_frame(&mut self, _buf: &mut Vec<u8>) -> Result<(), CaptureError> {
            Ok(())
        }

        fn set_frame_rate(&mut self, _rate: f64) -> Result<(), CaptureError> {
            Ok(())
        }
    }

    fn surface() -> (ControlSurface, EngineHandle, tempfile::TempDir) {
        let engine = StreamingEngine::new(NoopSource, 30.0, "camera_optical_frame");
        let handle = engine.handle();
        let dir = tempfile::tempdir().unwrap();
        let persister = CalibrationPersister::new(dir.path(), "camera_node");
        (
            ControlSurface::new(handle.clone(), persister, 30.0, 15.0),
            handle,
            dir,
        )
    }

    #[test]
    fn rate_switch_maps_to_configured_rates() {
        let (surface, handle, _dir) = surface();

        assert!(surface.handle_request(ControlRequest::RateSwitch(false)));
        assert_eq!(handle.current_rate(), 15.0);

        assert!(surface.handle_request(ControlRequest::RateSwitch(true)));
        assert_eq!(handle.current_rate(), 30.0);
    }

    #[test]
    fn shutdown_stops_dispatch() {
        let (surface, _handle, _dir) = surface();
        assert!(!surface.handle_request(ControlRequest::Shutdown));
    }

    #[tokio::test]
    async fn calibration_save_replies_without_touching_capture() {
        let (surface, handle, _dir) = surface();
        let (tx, rx) = flume::bounded(4);
        let run = tokio::spawn(surface.run(rx));

        let (reply_tx, reply_rx) = flume::bounded(1);
        tx.send(ControlRequest::SaveCalibration {
            params: CalibrationParameters {
                image_width: 640,
                image_height: 480,
                distortion_model: "plumb_bob".into(),
                distortion_coefficients: vec![0.0; 5],
                camera_matrix: vec![0.0; 9],
                rectification_matrix: vec![0.0; 9],
                projection_matrix: vec![0.0; 12],
            },
            target: "front".into(),
            reply: reply_tx,
        })
        .unwrap();

        let response = reply_rx.recv_async().await.unwrap();
        assert!(response.success, "{}", response.message);
        assert_eq!(handle.current_rate(), 30.0);

        tx.send(ControlRequest::Shutdown).unwrap();
        run.await.unwrap();
    }
}
