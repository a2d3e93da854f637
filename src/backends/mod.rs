// SPDX-License-Identifier: MPL-2.0

//! Backend layer between the scanner and the system
//!
//! This module provides the platform-specific pieces the front-ends drive:
//! - Camera capture and QR decoding via GStreamer
//! - Camera permission via the XDG camera portal
//! - URL hand-off to the system handler
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Front-ends (GUI / terminal / CLI)     │
//! │                 ScanCoordinator              │
//! └────────────────────┬────────────────────────┘
//!                      │ effects
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │ Permission  │    │     Camera       │   │
//! │  │  (portal)   │    │ (GStreamer+rqrr) │   │
//! │  └─────────────┘    └──────────────────┘   │
//! │  ┌─────────────┐                           │
//! │  │   Handoff   │                           │
//! │  │  (xdg-open) │                           │
//! │  └─────────────┘                           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Device enumeration, capture sessions and the QR decoder
//! - [`permission`]: Camera authorization status and requests
//! - [`handoff`]: Opening `FIDO:/` URLs and the camera settings page

pub mod camera;
pub mod handoff;
pub mod permission;
