// SPDX-License-Identifier: MPL-2.0

//! Camera capture adapter
//!
//! ```text
//! ┌─────────────────────┐
//! │  Scan coordinator   │
//! └──────────▲──────────┘
//!            │ CaptureListener (decoded | error), exactly once
//! ┌──────────┴──────────┐
//! │   CaptureSession    │  ← single-shot reporting, bus watcher
//! └──────────┬──────────┘
//!            │ GRAY8 frames
//! ┌──────────┴──────────┐
//! │ GStreamer pipeline  │  ← pipewiresrc / v4l2src → appsink
//! └─────────────────────┘
//! ```
//!
//! Only QR codes are recognised; other symbologies never reach the listener.

pub mod decoder;
pub mod enumeration;
pub mod pipeline;
pub mod session;
pub mod types;

pub use decoder::QrDecoder;
pub use enumeration::enumerate_cameras;
pub use session::{CaptureListener, CaptureOptions, CaptureSession, ChannelListener};
pub use types::*;

/// Pick the camera to scan with
///
/// The remembered camera wins when it is still present, then the first one
/// found. Inside the sandbox `pw-cli` cannot see the daemon, so PipeWire's
/// default camera stands in when nothing was enumerated.
pub fn select_camera(
    cameras: &[CameraDevice],
    last_path: Option<&str>,
    backend: CameraBackendType,
) -> Option<CameraDevice> {
    if let Some(path) = last_path
        && let Some(camera) = cameras.iter().find(|c| c.path == path)
    {
        return Some(camera.clone());
    }

    if let Some(camera) = cameras.first() {
        return Some(camera.clone());
    }

    let pipewire_allowed = backend != CameraBackendType::V4l2;
    (pipewire_allowed && crate::constants::app_info::is_flatpak())
        .then(CameraDevice::pipewire_default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(path: &str) -> CameraDevice {
        CameraDevice {
            name: path.to_string(),
            path: path.to_string(),
            source: CameraSource::V4l2 {
                device: path.to_string(),
            },
        }
    }

    #[test]
    fn test_select_remembered_camera() {
        let cameras = vec![camera("/dev/video0"), camera("/dev/video2")];
        let selected = select_camera(&cameras, Some("/dev/video2"), CameraBackendType::Auto);
        assert_eq!(selected.map(|c| c.path), Some("/dev/video2".to_string()));
    }

    #[test]
    fn test_select_first_when_remembered_is_gone() {
        let cameras = vec![camera("/dev/video0")];
        let selected = select_camera(&cameras, Some("/dev/video4"), CameraBackendType::Auto);
        assert_eq!(selected.map(|c| c.path), Some("/dev/video0".to_string()));
    }

    #[test]
    fn test_select_none_for_v4l2_without_devices() {
        assert_eq!(select_camera(&[], None, CameraBackendType::V4l2), None);
    }
}
