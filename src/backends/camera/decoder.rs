// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoding
//!
//! Frames are optionally downscaled, then handed to `rqrr` which locates QR
//! finder patterns and decodes the grids it finds. Only the QR symbology is
//! recognised.

use super::types::LumaFrame;
use crate::constants::pipeline;
use tracing::{debug, trace};

/// QR code decoder
///
/// Optimized for real-time use: large frames are downscaled before the grid
/// search, which is the expensive part.
#[derive(Debug, Clone)]
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: pipeline::MAX_DECODE_DIMENSION,
        }
    }

    /// First QR payload found in the frame
    pub fn decode_first(&self, frame: &LumaFrame) -> Option<String> {
        if frame.width == 0 || frame.height == 0 {
            return None;
        }

        let start = std::time::Instant::now();
        let (width, height, pixels) = self.prepare_pixels(frame);

        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                pixels[y * width as usize + x]
            });
        let grids = prepared.detect_grids();

        let payload = grids.iter().find_map(|grid| match grid.decode() {
            Ok((meta, content)) => {
                debug!(version = meta.version.0, "Decoded QR code");
                Some(content)
            }
            Err(e) => {
                trace!(error = %e, "QR grid failed to decode");
                None
            }
        });

        trace!(
            width,
            height,
            grids = grids.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "QR decode pass"
        );
        payload
    }

    /// Packed pixels at processing resolution
    fn prepare_pixels(&self, frame: &LumaFrame) -> (u32, u32, Vec<u8>) {
        let max_dim = self.max_dimension;
        if frame.width > max_dim || frame.height > max_dim {
            let scale = (frame.width as f32 / max_dim as f32)
                .max(frame.height as f32 / max_dim as f32);
            let new_width = ((frame.width as f32 / scale) as u32).max(1);
            let new_height = ((frame.height as f32 / scale) as u32).max(1);
            let pixels = downscale_luma(frame, new_width, new_height);
            (new_width, new_height, pixels)
        } else {
            (frame.width, frame.height, copy_luma_without_stride(frame))
        }
    }
}

/// Copy luma data without stride padding
fn copy_luma_without_stride(frame: &LumaFrame) -> Vec<u8> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;

    let mut result = Vec::with_capacity(width * height);

    for y in 0..height {
        let row_start = y * stride;
        let row_end = row_start + width;
        if row_end <= frame.data.len() {
            result.extend_from_slice(&frame.data[row_start..row_end]);
        } else {
            // Truncated buffer; pad so indexing stays in bounds
            result.resize((y + 1) * width, 0);
        }
    }

    result
}

/// Downscale a luma frame using bilinear interpolation
fn downscale_luma(frame: &LumaFrame, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = frame.width;
    let src_height = frame.height;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as u32;
            let y0 = src_y as u32;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let p00 = frame.luma(x0, y0) as f32;
            let p01 = frame.luma(x1, y0) as f32;
            let p10 = frame.luma(x0, y1) as f32;
            let p11 = frame.luma(x1, y1) as f32;

            let value = p00 * (1.0 - x_frac) * (1.0 - y_frac)
                + p01 * x_frac * (1.0 - y_frac)
                + p10 * (1.0 - x_frac) * y_frac
                + p11 * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}

/// White frame with `payload` drawn as a QR code in its center
#[cfg(test)]
pub(crate) fn qr_frame(payload: &str, module_px: u32, width: u32, height: u32) -> LumaFrame {
    let code = qrcode::QrCode::new(payload.as_bytes()).expect("payload fits in a QR code");
    let modules = code.width() as u32;
    let size = modules * module_px;
    assert!(size <= width && size <= height, "frame too small for code");

    let left = (width - size) / 2;
    let top = (height - size) / 2;
    let mut data = vec![255u8; (width * height) as usize];
    for y in 0..size {
        for x in 0..size {
            let module = (x / module_px) as usize;
            let row = (y / module_px) as usize;
            if code[(module, row)] == qrcode::Color::Dark {
                data[((top + y) * width + left + x) as usize] = 0;
            }
        }
    }
    LumaFrame::from_packed(width, height, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_copy_luma_without_stride() {
        let frame = LumaFrame {
            width: 2,
            height: 2,
            stride: 4,
            data: Arc::from(vec![1u8, 2, 0, 0, 3, 4, 0, 0]),
            captured_at: Instant::now(),
        };
        assert_eq!(copy_luma_without_stride(&frame), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_copy_luma_pads_truncated_buffer() {
        let frame = LumaFrame {
            width: 2,
            height: 2,
            stride: 2,
            data: Arc::from(vec![1u8, 2, 3]),
            captured_at: Instant::now(),
        };
        assert_eq!(copy_luma_without_stride(&frame).len(), 4);
    }

    #[test]
    fn test_downscale_luma() {
        // 4x2 gradient
        let frame = LumaFrame::from_packed(4, 2, vec![0, 85, 170, 255, 0, 85, 170, 255]);
        let result = downscale_luma(&frame, 2, 1);
        assert_eq!(result.len(), 2);
        assert!(result[0] < 100);
        assert!(result[1] > 150);
    }

    #[test]
    fn test_blank_frame_has_no_codes() {
        let decoder = QrDecoder::new();
        let frame = LumaFrame::from_packed(64, 64, vec![255; 64 * 64]);
        assert_eq!(decoder.decode_first(&frame), None);
    }

    #[test]
    fn test_empty_frame() {
        let frame = LumaFrame::from_packed(0, 0, Vec::new());
        assert_eq!(QrDecoder::new().decode_first(&frame), None);
    }

    #[test]
    fn test_decodes_passkey_code() {
        let frame = qr_frame("FIDO:/1234567890ABCDEF", 6, 320, 240);
        assert_eq!(
            QrDecoder::new().decode_first(&frame).as_deref(),
            Some("FIDO:/1234567890ABCDEF")
        );
    }

    #[test]
    fn test_decodes_code_in_downscaled_frame() {
        let frame = qr_frame("FIDO:/1234567890ABCDEF", 24, 1280, 960);
        let decoder = QrDecoder::new();

        let (w, h, _) = decoder.prepare_pixels(&frame);
        assert_eq!((w, h), (640, 480));
        assert_eq!(
            decoder.decode_first(&frame).as_deref(),
            Some("FIDO:/1234567890ABCDEF")
        );
    }

    #[test]
    fn test_decodes_frame_with_row_padding() {
        let packed = qr_frame("FIDO:/42", 4, 160, 120);
        let stride = 192;
        let mut data = vec![0u8; (stride * packed.height) as usize];
        for y in 0..packed.height as usize {
            let row = &packed.data[y * 160..(y + 1) * 160];
            data[y * stride as usize..y * stride as usize + 160].copy_from_slice(row);
        }
        let frame = LumaFrame {
            stride,
            data: Arc::from(data),
            ..packed
        };
        assert_eq!(
            QrDecoder::new().decode_first(&frame).as_deref(),
            Some("FIDO:/42")
        );
    }

    #[test]
    fn test_large_frame_is_downscaled() {
        let decoder = QrDecoder::new();
        let frame = LumaFrame::from_packed(1280, 720, vec![128; 1280 * 720]);
        let (w, h, pixels) = decoder.prepare_pixels(&frame);
        assert_eq!(w, 640);
        assert_eq!(h, 360);
        assert_eq!(pixels.len(), (w * h) as usize);
    }
}
