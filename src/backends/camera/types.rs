// SPDX-License-Identifier: MPL-2.0

//! Shared types for the camera capture adapter

use crate::errors::CaptureError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which capture stack to enumerate cameras from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraBackendType {
    /// PipeWire when available, V4L2 otherwise
    #[default]
    Auto,
    /// PipeWire video sources only
    PipeWire,
    /// Raw V4L2 device nodes only
    V4l2,
}

impl CameraBackendType {
    pub const ALL: [CameraBackendType; 3] = [
        CameraBackendType::Auto,
        CameraBackendType::PipeWire,
        CameraBackendType::V4l2,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            CameraBackendType::Auto => "Automatic",
            CameraBackendType::PipeWire => "PipeWire",
            CameraBackendType::V4l2 => "V4L2",
        }
    }
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a camera's frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// PipeWire node; `None` lets PipeWire pick the default camera
    PipeWire { target: Option<String> },
    /// V4L2 device node such as `/dev/video0`
    V4l2 { device: String },
}

/// A camera that can be opened by a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Human readable name
    pub name: String,
    /// Stable identifier, remembered in the config
    pub path: String,
    pub source: CameraSource,
}

impl CameraDevice {
    /// PipeWire's default camera
    pub fn pipewire_default() -> Self {
        Self {
            name: "Default Camera (PipeWire)".to_string(),
            path: String::new(),
            source: CameraSource::PipeWire { target: None },
        }
    }
}

/// 8-bit grayscale frame
#[derive(Debug, Clone)]
pub struct LumaFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, may include padding
    pub stride: u32,
    pub data: Arc<[u8]>,
    pub captured_at: Instant,
}

impl LumaFrame {
    /// Build a tightly packed frame
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width,
            data: Arc::from(data),
            captured_at: Instant::now(),
        }
    }

    /// Pixel value, 0 outside the buffer
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let offset = y as usize * self.stride as usize + x as usize;
        self.data.get(offset).copied().unwrap_or(0)
    }

    /// Expand to opaque RGBA for display
    pub fn to_rgba(&self, mirrored: bool) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let src_x = if mirrored { self.width - 1 - x } else { x };
                let v = self.luma(src_x, y);
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        rgba
    }
}

/// Event produced by a capture session
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Preview frame
    Frame(LumaFrame),
    /// First decoded QR payload
    Decoded(String),
    /// Session failed before decoding anything
    Failed(CaptureError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_with_stride_padding() {
        // 2x2 frame, 3 bytes per row (1 byte padding)
        let frame = LumaFrame {
            width: 2,
            height: 2,
            stride: 3,
            data: Arc::from(vec![10u8, 20, 0, 30, 40, 0]),
            captured_at: Instant::now(),
        };
        assert_eq!(frame.luma(0, 0), 10);
        assert_eq!(frame.luma(1, 0), 20);
        assert_eq!(frame.luma(0, 1), 30);
        assert_eq!(frame.luma(1, 1), 40);
        assert_eq!(frame.luma(5, 5), 0);
    }

    #[test]
    fn test_to_rgba_mirrors_rows() {
        let frame = LumaFrame::from_packed(2, 1, vec![1, 2]);
        assert_eq!(frame.to_rgba(false), vec![1, 1, 1, 255, 2, 2, 2, 255]);
        assert_eq!(frame.to_rgba(true), vec![2, 2, 2, 255, 1, 1, 1, 255]);
    }
}
