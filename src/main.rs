//! Artemis camera node: continuous capture with a concurrent control plane.

use std::thread;

use artemis::calibration::CalibrationPersister;
use artemis::capture::V4l2Source;
use artemis::control::{ControlRequest, ControlSurface};
use artemis::engine::StreamingEngine;
use artemis::sink::ChannelSink;
use artemis::Config;
use color_eyre::Result;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("artemis=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Artemis launching...");

    let config = Config::default();

    // Acquire the camera up front; failing here aborts startup rather than
    // running a degraded node.
    let initial_rate = config.capture.framerate_high;
    let source = V4l2Source::open(&config.capture, initial_rate)?;

    let engine = StreamingEngine::new(source, initial_rate, &config.capture.frame_id);
    let handle = engine.handle();

    let (sink, frames) = ChannelSink::new(config.capture.frame_queue_depth);

    // Stand-in for the outbound transport: drain the frame pipe.
    let publish_task = tokio::spawn(async move {
        while let Ok(frame) = frames.recv_async().await {
            debug!(bytes = frame.data.len(), sec = frame.stamp.sec, "frame out");
        }
    });

    // Capture agent: a dedicated thread, since the V4L2 dequeue blocks.
    let capture_agent = thread::spawn(move || {
        let result = engine.start(&sink);
        if let Err(e) = &result {
            error!("capture failed: {}", e);
        }
        result
    });

    // Control agent.
    let (control_tx, control_rx) = flume::bounded::<ControlRequest>(16);
    let persister = CalibrationPersister::new(
        config.calibration.dir.clone(),
        config.calibration.camera_name.clone(),
    );
    let surface = ControlSurface::new(
        handle.clone(),
        persister,
        config.capture.framerate_high,
        config.capture.framerate_low,
    );
    let control_task = tokio::spawn(surface.run(control_rx));

    let mut capture_done = tokio::task::spawn_blocking(move || capture_agent.join());

    // Run until either a termination signal arrives or the capture agent
    // exits on its own, which only happens on a hardware fault.
    let joined = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("termination signal received");
            // Route shutdown through the control surface; fall back to the
            // handle if the surface is already gone.
            if control_tx.send(ControlRequest::Shutdown).is_err() {
                handle.request_shutdown();
            }
            // The camera is released only after the capture agent has fully
            // exited.
            (&mut capture_done).await?
        }
        joined = &mut capture_done => {
            let _ = control_tx.send(ControlRequest::Shutdown);
            joined?
        }
    };

    control_task.await?;
    publish_task.abort();

    match joined {
        Ok(result) => result?,
        Err(_) => return Err(color_eyre::eyre::eyre!("capture agent panicked")),
    }

    info!("Artemis shut down");
    Ok(())
}
