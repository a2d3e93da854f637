// SPDX-License-Identifier: MPL-2.0

//! Passkey Scanner - scan passkey sign-in QR codes on the COSMIC desktop
//!
//! A phone or another computer shows a `FIDO:/` QR code during a cross-device
//! passkey sign-in. This crate scans it with the camera, asks for confirmation
//! and hands the request to the system URL handler (the password manager).
//!
//! # Architecture
//!
//! - [`scan`]: Scan coordinator and payload validation shared by every front-end
//! - [`backends`]: Camera capture, QR decoding, camera permission, URL hand-off
//! - [`app`]: COSMIC GUI front-end
//! - [`terminal`]: Terminal front-end
//! - [`config`]: User configuration handling

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod i18n;
pub mod scan;
pub mod terminal;

// Re-export commonly used types
pub use app::{AppModel, Message};
pub use config::Config;
pub use scan::{Alert, Effect, HandoffUrl, ScanCoordinator, ScanState};
