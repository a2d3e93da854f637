// SPDX-License-Identifier: GPL-3.0-only

//! Message update handling
//!
//! The main `update()` function acts as a dispatcher, while specific handlers are implemented
//! in the `handlers` submodules organized by functional domain.
//!
//! # Handler Modules
//!
//! - `handlers::ui`: UI navigation and the context drawer
//! - `handlers::scan`: Permission flow, capture events, hand-off, manual entry
//! - `handlers::system`: Camera discovery, settings, configuration

use crate::app::state::{AppModel, Message};
use cosmic::Task;

impl AppModel {
    /// Main message handler - routes messages to appropriate handler methods.
    pub fn update(&mut self, message: Message) -> Task<cosmic::Action<Message>> {
        match message {
            // ===== UI Navigation =====
            Message::LaunchUrl(url) => self.handle_launch_url(url),
            Message::ToggleContextPage(page) => self.handle_toggle_context_page(page),

            // ===== Scanning =====
            Message::StartScan => self.handle_start_scan(),
            Message::PermissionChecked(status) => self.handle_permission_checked(status),
            Message::PermissionRequested(result) => self.handle_permission_requested(result),
            Message::CancelScan => self.handle_cancel_scan(),
            Message::Capture(session, event) => self.handle_capture_event(session, event),
            Message::PreviewFrame(session, handle) => self.handle_preview_frame(session, handle),
            Message::ResetScanner(generation) => self.handle_reset_scanner(generation),

            // ===== Hand-off =====
            Message::ConfirmHandoff => self.handle_confirm_handoff(),
            Message::CancelHandoff => self.handle_cancel_handoff(),
            Message::HandoffFinished(result) => self.handle_handoff_finished(result),
            Message::OpenPermissionSettings => self.handle_open_permission_settings(),
            Message::DismissPermissionAlert => self.handle_dismiss_permission_alert(),

            // ===== Manual Entry =====
            Message::ShowManualEntry => self.handle_show_manual_entry(),
            Message::DismissManualEntry => self.handle_dismiss_manual_entry(),
            Message::ManualInputChanged(text) => self.handle_manual_input_changed(text),
            Message::SubmitManualEntry => self.handle_submit_manual_entry(),

            // ===== Settings =====
            Message::CamerasInitialized(cameras) => self.handle_cameras_initialized(cameras),
            Message::SelectCamera(index) => self.handle_select_camera(index),
            Message::SelectBackend(index) => self.handle_select_backend(index),
            Message::SetAppTheme(index) => self.handle_set_app_theme(index),
            Message::ToggleMirrorPreview => self.handle_toggle_mirror_preview(),
            Message::UpdateConfig(config) => self.handle_update_config(config),
        }
    }
}
