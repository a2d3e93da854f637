// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scheme token that marks a cross-device passkey request.
///
/// Matched case-insensitively against the start of a decoded payload.
pub const FIDO_PREFIX: &str = "FIDO:/";

/// Scanner timing values
pub mod timing {
    use super::Duration;

    /// Delay before the scanner clears its state after a scan attempt.
    /// Long enough for a dialog to finish closing before the page changes.
    pub const RESET_DELAY: Duration = Duration::from_millis(500);

    /// Poll interval of the terminal event loop
    pub const TERMINAL_POLL: Duration = Duration::from_millis(16);

    /// Bus poll interval of the capture error watcher
    pub const BUS_POLL_MS: u64 = 100;

    /// Timeout for a pipeline to reach PLAYING
    pub const STATE_CHANGE_TIMEOUT_MS: u64 = 50;

    /// Timeout for a pipeline to reach NULL on teardown
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Log frame statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Capture pipeline settings
pub mod pipeline {
    /// Frames are downscaled so the longest side is at most this many pixels
    /// before QR detection
    pub const MAX_DECODE_DIMENSION: u32 = 640;

    /// Decode every Nth frame; the preview still receives all frames
    pub const DECODE_EVERY_N_FRAMES: u64 = 3;

    /// Appsink queue depth; old frames are dropped when decoding lags
    pub const MAX_BUFFERS: u32 = 2;

    /// Pipeline launch attempts (PipeWire nodes can be briefly busy)
    pub const CREATE_RETRIES: u32 = 3;

    /// Delay between launch attempts
    pub const RETRY_DELAY_MS: u64 = 300;

    /// Pixel format requested from videoconvert
    pub const OUTPUT_FORMAT: &str = "GRAY8";
}

/// UI dimensions
pub mod ui {
    /// Size of the idle page illustration
    pub const HERO_ICON_SIZE: u16 = 150;

    /// Maximum width of the primary buttons and manual entry form
    pub const FORM_MAX_WIDTH: f32 = 420.0;

    /// Bottom margin of the cancel button over the preview
    pub const CANCEL_BUTTON_MARGIN: u16 = 48;

    /// Example payload shown beneath the manual entry field
    pub const MANUAL_ENTRY_EXAMPLE: &str = "FIDO:/1234567890ABCDEF";
}

/// Application information utilities
pub mod app_info {
    use std::path::Path;

    /// Reverse-DNS application id, shared by the config store and the portal
    pub const APP_ID: &str = "io.github.cosmic_utils.PasskeyScanner";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// Check if the application is running inside a Flatpak sandbox
    pub fn is_flatpak() -> bool {
        Path::new("/.flatpak-info").exists()
    }

    /// Get the runtime environment string (e.g., "Flatpak" or "Native")
    pub fn runtime_environment() -> &'static str {
        if is_flatpak() { "Flatpak" } else { "Native" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_upper_case_scheme() {
        assert_eq!(FIDO_PREFIX, FIDO_PREFIX.to_uppercase());
        assert!(FIDO_PREFIX.ends_with(":/"));
    }

    #[test]
    fn test_reset_delay_is_short() {
        assert!(timing::RESET_DELAY <= Duration::from_secs(1));
        assert!(!timing::RESET_DELAY.is_zero());
    }
}
