// SPDX-License-Identifier: MPL-2.0

//! Single-shot capture sessions
//!
//! A session streams frames from one camera, runs the QR decoder on a subset
//! of them and reports the outcome to its listener exactly once: either the
//! first decoded payload or the first failure. Preview frames keep flowing
//! until then.

use super::decoder::QrDecoder;
use super::pipeline::{CapturePipeline, FrameCallback, pipeline_description};
use super::types::{CameraDevice, CaptureEvent, LumaFrame};
use crate::constants::{pipeline, timing};
use crate::errors::CaptureError;
use futures::channel::mpsc;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Receives the outcome of a capture session
///
/// Methods are called from GStreamer threads.
pub trait CaptureListener: Send + Sync {
    /// First QR payload seen by the session
    fn on_decoded(&self, payload: String);

    /// The session failed before decoding anything
    fn on_error(&self, error: CaptureError);

    /// Preview frame
    fn on_frame(&self, _frame: LumaFrame) {}
}

/// Listener that forwards events into a channel
///
/// Preview frames are dropped when the receiver lags; the decisive event
/// always gets through.
pub struct ChannelListener {
    frames: Mutex<mpsc::Sender<CaptureEvent>>,
    outcome: mpsc::Sender<CaptureEvent>,
}

impl ChannelListener {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        let listener = Self {
            frames: Mutex::new(sender.clone()),
            outcome: sender,
        };
        (listener, receiver)
    }

    fn send_outcome(&self, event: CaptureEvent) {
        // A fresh sender always has room for one message
        let mut sender = self.outcome.clone();
        if let Err(e) = sender.try_send(event) {
            debug!(error = %e, "Capture outcome receiver gone");
        }
    }
}

impl CaptureListener for ChannelListener {
    fn on_decoded(&self, payload: String) {
        self.send_outcome(CaptureEvent::Decoded(payload));
    }

    fn on_error(&self, error: CaptureError) {
        self.send_outcome(CaptureEvent::Failed(error));
    }

    fn on_frame(&self, frame: LumaFrame) {
        if let Ok(mut sender) = self.frames.lock()
            && sender.try_send(CaptureEvent::Frame(frame)).is_err()
        {
            debug!("Preview frame dropped (channel full)");
        }
    }
}

/// Guards the single report a session is allowed to make
struct Reporter {
    listener: Arc<dyn CaptureListener>,
    reported: AtomicBool,
}

impl Reporter {
    fn new(listener: Arc<dyn CaptureListener>) -> Self {
        Self {
            listener,
            reported: AtomicBool::new(false),
        }
    }

    fn is_done(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    fn decoded(&self, payload: String) {
        if !self.reported.swap(true, Ordering::AcqRel) {
            info!("QR code decoded");
            self.listener.on_decoded(payload);
        }
    }

    fn failed(&self, error: CaptureError) {
        if !self.reported.swap(true, Ordering::AcqRel) {
            warn!(%error, "Capture session failed");
            self.listener.on_error(error);
        }
    }

    fn frame(&self, frame: LumaFrame) {
        if !self.is_done() {
            self.listener.on_frame(frame);
        }
    }
}

/// Options for [`CaptureSession::start`]
#[derive(Debug, Default)]
pub struct CaptureOptions {
    /// PipeWire remote from the camera portal; kept open for the session
    pub pipewire_fd: Option<OwnedFd>,
    /// Run the decoder on every Nth frame; 0 uses the default
    pub decode_every: u64,
}

/// Running capture session
///
/// Dropping the session releases the camera.
pub struct CaptureSession {
    device: CameraDevice,
    stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
    pipeline: CapturePipeline,
    // Dropped after the pipeline that reads from it
    _pipewire_fd: Option<OwnedFd>,
}

impl CaptureSession {
    /// Open `device` and start decoding
    ///
    /// Start-up failures are reported to the listener as well as returned.
    pub fn start(
        device: &CameraDevice,
        options: CaptureOptions,
        listener: Arc<dyn CaptureListener>,
    ) -> Result<Self, CaptureError> {
        info!(device = %device.name, "Starting capture session");

        let reporter = Arc::new(Reporter::new(listener));
        let description = pipeline_description(
            &device.source,
            options.pipewire_fd.as_ref().map(|fd| fd.as_raw_fd()),
        );
        let decode_every = match options.decode_every {
            0 => pipeline::DECODE_EVERY_N_FRAMES,
            n => n,
        };

        let pipeline = match CapturePipeline::launch(
            &description,
            frame_handler(reporter.clone(), decode_every),
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                error!(error = %e, "Failed to start capture pipeline");
                reporter.failed(e.clone());
                return Err(e);
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = match pipeline.bus() {
            Some(bus) => Some(spawn_bus_watcher(bus, reporter, stop.clone())),
            None => {
                warn!("Capture pipeline has no bus, runtime errors will not be reported");
                None
            }
        };

        Ok(Self {
            device: device.clone(),
            stop,
            watcher,
            pipeline,
            _pipewire_fd: options.pipewire_fd,
        })
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        info!(device = %self.device.name, "Stopping capture session");
        self.stop.store(true, Ordering::Release);
        self.pipeline.shutdown();
        if let Some(watcher) = self.watcher.take()
            && watcher.join().is_err()
        {
            error!("Bus watcher panicked");
        }
    }
}

/// Appsink callback: preview every frame, decode every `decode_every`th
fn frame_handler(reporter: Arc<Reporter>, decode_every: u64) -> FrameCallback {
    let decoder = QrDecoder::new();
    let counter = AtomicU64::new(0);

    Arc::new(move |frame: LumaFrame| {
        if reporter.is_done() {
            return;
        }

        let frame_num = counter.fetch_add(1, Ordering::Relaxed);
        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = frame_num,
                width = frame.width,
                height = frame.height,
                "Capture frame"
            );
        }

        if frame_num % decode_every == 0
            && let Some(payload) = decoder.decode_first(&frame)
        {
            reporter.decoded(payload);
        }
        reporter.frame(frame);
    })
}

fn spawn_bus_watcher(
    bus: gstreamer::Bus,
    reporter: Arc<Reporter>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        while !stop.load(Ordering::Acquire) && !reporter.is_done() {
            let Some(msg) = bus.timed_pop_filtered(
                gstreamer::ClockTime::from_mseconds(timing::BUS_POLL_MS),
                &[gstreamer::MessageType::Error, gstreamer::MessageType::Eos],
            ) else {
                continue;
            };

            // Errors raised while tearing down are expected
            if stop.load(Ordering::Acquire) {
                break;
            }

            match msg.view() {
                gstreamer::MessageView::Error(err) => {
                    let debug_info = err.debug().map(|d| d.to_string()).unwrap_or_default();
                    error!(error = %err.error(), debug = %debug_info, "Capture pipeline error");
                    reporter.failed(CaptureError::Runtime(err.error().to_string()));
                    break;
                }
                gstreamer::MessageView::Eos(_) => {
                    reporter.failed(CaptureError::EndOfStream);
                    break;
                }
                _ => {}
            }
        }
        debug!("Bus watcher finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl CaptureListener for RecordingListener {
        fn on_decoded(&self, payload: String) {
            self.events.lock().unwrap().push(format!("decoded:{}", payload));
        }

        fn on_error(&self, error: CaptureError) {
            self.events.lock().unwrap().push(format!("error:{}", error));
        }

        fn on_frame(&self, _frame: LumaFrame) {
            self.events.lock().unwrap().push("frame".to_string());
        }
    }

    #[test]
    fn test_reporter_reports_once() {
        let listener = Arc::new(RecordingListener::default());
        let reporter = Reporter::new(listener.clone());

        reporter.frame(LumaFrame::from_packed(1, 1, vec![0]));
        reporter.decoded("FIDO:/first".to_string());
        reporter.decoded("FIDO:/second".to_string());
        reporter.failed(CaptureError::EndOfStream);
        reporter.frame(LumaFrame::from_packed(1, 1, vec![0]));

        let events = listener.events.lock().unwrap();
        assert_eq!(*events, vec!["frame", "decoded:FIDO:/first"]);
        assert!(reporter.is_done());
    }

    #[test]
    fn test_reporter_error_wins_when_first() {
        let listener = Arc::new(RecordingListener::default());
        let reporter = Reporter::new(listener.clone());

        reporter.failed(CaptureError::Runtime("device unplugged".to_string()));
        reporter.decoded("FIDO:/late".to_string());

        let events = listener.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("error:"));
    }

    #[test]
    fn test_frame_handler_stops_after_report() {
        let listener = Arc::new(RecordingListener::default());
        let reporter = Arc::new(Reporter::new(listener.clone()));
        let handler = frame_handler(reporter.clone(), 1);

        handler(LumaFrame::from_packed(8, 8, vec![255; 64]));
        reporter.failed(CaptureError::EndOfStream);
        handler(LumaFrame::from_packed(8, 8, vec![255; 64]));

        let events = listener.events.lock().unwrap();
        assert_eq!(events[0], "frame");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_frame_handler_decodes_code_once() {
        let listener = Arc::new(RecordingListener::default());
        let reporter = Arc::new(Reporter::new(listener.clone()));
        let handler = frame_handler(reporter.clone(), 1);
        let code = super::super::decoder::qr_frame("FIDO:/1234567890ABCDEF", 6, 320, 240);

        handler(LumaFrame::from_packed(8, 8, vec![255; 64]));
        for _ in 0..3 {
            handler(code.clone());
        }

        let events = listener.events.lock().unwrap();
        assert_eq!(*events, vec!["frame", "decoded:FIDO:/1234567890ABCDEF"]);
        assert!(reporter.is_done());
    }

    #[test]
    fn test_channel_listener_delivers_outcome_when_frames_fill_buffer() {
        let (listener, receiver) = ChannelListener::new(1);

        for _ in 0..4 {
            listener.on_frame(LumaFrame::from_packed(1, 1, vec![0]));
        }
        listener.on_decoded("FIDO:/ABC".to_string());
        drop(listener);

        let events: Vec<CaptureEvent> = pollster::block_on(receiver.collect());
        assert!(matches!(
            events.last(),
            Some(CaptureEvent::Decoded(payload)) if payload == "FIDO:/ABC"
        ));
        // Buffer of one plus a slot per sender
        assert!(events.len() < 6);
    }
}
