// SPDX-License-Identifier: GPL-3.0-only

//! Application state management

use crate::backends::camera::{CameraDevice, CaptureEvent};
use crate::backends::handoff::UrlOpener;
use crate::backends::permission::{CameraPermission, PermissionStatus};
use crate::config::Config;
use crate::errors::{HandoffError, PermissionError};
use crate::scan::ScanCoordinator;
use cosmic::cosmic_config;
use cosmic::widget::{self, about::About};
use std::sync::Arc;

/// Camera discovery progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CameraAvailability {
    /// Enumeration still running
    #[default]
    Unknown,
    /// At least one camera can be opened
    Available,
    /// Nothing to scan with; only manual entry is offered
    Unavailable,
}

/// The main application model
pub struct AppModel {
    /// Application state which is managed by the COSMIC runtime.
    pub core: cosmic::Core,
    /// Display a context drawer with the designated page if defined.
    pub context_page: ContextPage,
    /// The about page for this app.
    pub about: About,
    /// Configuration data that persists between application runs.
    pub config: Config,
    /// Configuration handler for saving settings
    pub config_handler: Option<cosmic_config::Config>,
    /// Scanner state machine
    pub coordinator: ScanCoordinator,
    /// Camera permission backend
    pub permission: Arc<dyn CameraPermission>,
    /// URL and settings launcher
    pub opener: Arc<dyn UrlOpener>,
    /// Cameras found at startup or after a backend change
    pub available_cameras: Vec<CameraDevice>,
    /// Index into `available_cameras`
    pub current_camera_index: usize,
    pub camera_availability: CameraAvailability,
    /// Latest preview frame
    pub preview: Option<widget::image::Handle>,
    pub camera_dropdown_options: Vec<String>,
    pub theme_dropdown_options: Vec<String>,
    pub backend_dropdown_options: Vec<String>,
}

impl AppModel {
    /// Camera the next scan will use
    pub fn current_camera(&self) -> Option<&CameraDevice> {
        self.available_cameras.get(self.current_camera_index)
    }
}

/// The context page to display in the context drawer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ContextPage {
    #[default]
    About,
    Settings,
}

/// Messages emitted by the application and its widgets.
///
/// Messages are organized into logical groups:
/// - **UI Navigation**: context drawer and external links
/// - **Scanning**: permission flow and capture session events
/// - **Hand-off**: confirmation dialog and system hand-off
/// - **Manual Entry**: the text fallback for machines without a camera
/// - **Settings**: persisted preferences
#[derive(Debug, Clone)]
pub enum Message {
    // ===== UI Navigation =====
    /// Open external URL (repository, etc.)
    LaunchUrl(String),
    /// Toggle context drawer page (About, Settings)
    ToggleContextPage(ContextPage),

    // ===== Scanning =====
    /// Scan button pressed
    StartScan,
    /// Permission status read for a scan attempt
    PermissionChecked(PermissionStatus),
    /// Access request answered
    PermissionRequested(Result<bool, PermissionError>),
    /// Cancel button on the camera page
    CancelScan,
    /// Event from the capture session with this id
    Capture(u64, CaptureEvent),
    /// Preview frame from the capture session with this id, ready to draw
    PreviewFrame(u64, widget::image::Handle),
    /// Delayed reset fired
    ResetScanner(u64),

    // ===== Hand-off =====
    ConfirmHandoff,
    CancelHandoff,
    HandoffFinished(Result<(), HandoffError>),
    /// Open the system's camera settings from the permission alert
    OpenPermissionSettings,
    DismissPermissionAlert,

    // ===== Manual Entry =====
    ShowManualEntry,
    DismissManualEntry,
    ManualInputChanged(String),
    SubmitManualEntry,

    // ===== Settings =====
    /// Cameras enumerated
    CamerasInitialized(Vec<CameraDevice>),
    SelectCamera(usize),
    SelectBackend(usize),
    SetAppTheme(usize),
    ToggleMirrorPreview,
    /// Configuration changed on disk
    UpdateConfig(Config),
}
