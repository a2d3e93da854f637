// SPDX-License-Identifier: MPL-2.0

//! GStreamer pipeline for QR capture
//!
//! Every source is converted to 8-bit grayscale before it reaches the appsink,
//! so the decoder and the preview share the same buffers.

use super::types::{CameraSource, LumaFrame};
use crate::constants::{pipeline, timing};
use crate::errors::CaptureError;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Called from the streaming thread for every frame
pub type FrameCallback = Arc<dyn Fn(LumaFrame) + Send + Sync>;

/// Running capture pipeline
pub struct CapturePipeline {
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
}

/// Build the launch description for a source
///
/// `pipewire_fd` is the remote handed out by the camera portal; without it
/// pipewiresrc connects to the session daemon directly.
pub fn pipeline_description(source: &CameraSource, pipewire_fd: Option<RawFd>) -> String {
    let src = match source {
        CameraSource::PipeWire { target } => {
            let mut src = String::from("pipewiresrc");
            if let Some(fd) = pipewire_fd {
                src.push_str(&format!(" fd={}", fd));
            }
            if let Some(target) = target {
                src.push_str(&format!(" target-object={}", target));
            }
            src.push_str(" do-timestamp=true");
            src
        }
        CameraSource::V4l2 { device } => format!("v4l2src device={}", device),
    };

    format!(
        "{} ! decodebin ! videoconvert ! video/x-raw,format={} ! appsink name=sink",
        src,
        pipeline::OUTPUT_FORMAT
    )
}

impl CapturePipeline {
    /// Launch `description`, retrying while the device is busy
    pub fn launch(description: &str, on_frame: FrameCallback) -> Result<Self, CaptureError> {
        gstreamer::init().map_err(|e| CaptureError::InitializationFailed(e.to_string()))?;

        let mut last_error = None;
        for attempt in 1..=pipeline::CREATE_RETRIES {
            info!(pipeline = %description, attempt, "Launching capture pipeline");
            match Self::try_launch(description, on_frame.clone()) {
                Ok(capture) => return Ok(capture),
                Err(e) => {
                    if attempt < pipeline::CREATE_RETRIES {
                        warn!(
                            attempt,
                            max_attempts = pipeline::CREATE_RETRIES,
                            error = %e,
                            "Pipeline launch failed, retrying after {}ms",
                            pipeline::RETRY_DELAY_MS
                        );
                        std::thread::sleep(std::time::Duration::from_millis(
                            pipeline::RETRY_DELAY_MS,
                        ));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CaptureError::InitializationFailed("Pipeline creation failed".to_string())
        }))
    }

    fn try_launch(description: &str, on_frame: FrameCallback) -> Result<Self, CaptureError> {
        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| CaptureError::InitializationFailed(e.to_string()))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| CaptureError::InitializationFailed("Failed to cast to pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CaptureError::InitializationFailed("Failed to get appsink".into()))?
            .dynamic_cast::<AppSink>()
            .map_err(|_| CaptureError::InitializationFailed("Failed to cast appsink".into()))?;

        appsink.set_property("emit-signals", true);
        appsink.set_property("sync", false);
        appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
        appsink.set_property("drop", true);
        appsink.set_property("enable-last-sample", false);

        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    let frame = luma_frame(&sample).ok_or(gstreamer::FlowError::Error)?;
                    on_frame(frame);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let capture = Self { pipeline, appsink };
        capture.start()?;
        Ok(capture)
    }

    fn start(&self) -> Result<(), CaptureError> {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Playing) {
            let reason = self
                .pop_error()
                .unwrap_or_else(|| format!("Failed to set pipeline to PLAYING: {}", e));
            error!(%reason, "Capture pipeline failed to start");
            self.shutdown();
            return Err(CaptureError::InitializationFailed(reason));
        }

        let (result, state, pending) = self.pipeline.state(gstreamer::ClockTime::from_mseconds(
            timing::STATE_CHANGE_TIMEOUT_MS,
        ));
        debug!(?result, ?state, ?pending, "Pipeline state");

        let playing = result.is_ok() && state == gstreamer::State::Playing;
        // Devices can take a while to open; frames arrive once they do
        let starting = matches!(result, Ok(gstreamer::StateChangeSuccess::Async))
            && pending == gstreamer::State::Playing;

        if playing || starting {
            info!(?state, ?pending, "Capture pipeline started");
            Ok(())
        } else {
            let reason = self.pop_error().unwrap_or_else(|| {
                format!(
                    "Pipeline failed to start (state: {:?}, result: {:?})",
                    state, result
                )
            });
            error!(%reason, "Capture pipeline failed to reach PLAYING");
            self.shutdown();
            Err(CaptureError::InitializationFailed(reason))
        }
    }

    /// Pending error message on the bus, if any
    fn pop_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_mseconds(timing::BUS_POLL_MS),
            &[gstreamer::MessageType::Error],
        )?;
        match msg.view() {
            gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }

    /// Bus for the error watcher
    pub fn bus(&self) -> Option<gstreamer::Bus> {
        self.pipeline.bus()
    }

    /// Release the camera
    pub fn shutdown(&self) {
        self.appsink
            .set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            debug!(error = %e, "Failed to set pipeline to NULL");
            return;
        }
        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        debug!(?result, ?state, "Capture pipeline stopped");
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Copy a GRAY8 sample into a frame
fn luma_frame(sample: &gstreamer::Sample) -> Option<LumaFrame> {
    let buffer = sample.buffer()?;
    if buffer.flags().contains(gstreamer::BufferFlags::CORRUPTED) {
        return None;
    }
    let video_info = VideoInfo::from_caps(sample.caps()?).ok()?;
    let map = buffer.map_readable().ok()?;

    Some(LumaFrame {
        width: video_info.width(),
        height: video_info.height(),
        stride: video_info.stride()[0] as u32,
        data: Arc::from(map.as_slice()),
        captured_at: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipewire_default_description() {
        let desc = pipeline_description(&CameraSource::PipeWire { target: None }, None);
        assert_eq!(
            desc,
            "pipewiresrc do-timestamp=true ! decodebin ! videoconvert ! \
             video/x-raw,format=GRAY8 ! appsink name=sink"
        );
    }

    #[test]
    fn test_pipewire_portal_description() {
        let desc = pipeline_description(
            &CameraSource::PipeWire {
                target: Some("2146".to_string()),
            },
            Some(23),
        );
        assert!(desc.starts_with("pipewiresrc fd=23 target-object=2146 do-timestamp=true !"));
    }

    #[test]
    fn test_v4l2_description() {
        let desc = pipeline_description(
            &CameraSource::V4l2 {
                device: "/dev/video0".to_string(),
            },
            Some(23),
        );
        assert!(desc.starts_with("v4l2src device=/dev/video0 ! decodebin"));
        assert!(!desc.contains("fd="));
    }
}
