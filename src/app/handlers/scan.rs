// SPDX-License-Identifier: GPL-3.0-only

//! Scan handlers
//!
//! Drives the scan coordinator from UI messages and turns the effects it
//! requests into tasks. Capture sessions themselves are owned by the capture
//! subscription, which follows the coordinator's session id.

use crate::app::state::{AppModel, Message};
use crate::backends::camera::CaptureEvent;
use crate::backends::handoff::open_url_blocking;
use crate::backends::permission::PermissionStatus;
use crate::errors::{HandoffError, PermissionError};
use crate::scan::Effect;
use cosmic::Task;
use cosmic::widget;
use tracing::{debug, error, info, warn};

impl AppModel {
    // =========================================================================
    // Effect Execution
    // =========================================================================

    /// Run the side effects requested by the coordinator
    pub(crate) fn run_effects(&mut self, effects: Vec<Effect>) -> Task<cosmic::Action<Message>> {
        let tasks: Vec<_> = effects
            .into_iter()
            .map(|effect| self.run_effect(effect))
            .collect();
        Task::batch(tasks)
    }

    fn run_effect(&mut self, effect: Effect) -> Task<cosmic::Action<Message>> {
        match effect {
            Effect::RequestPermission => {
                let permission = self.permission.clone();
                Task::perform(async move { permission.request().await }, |result| {
                    cosmic::Action::App(Message::PermissionRequested(result))
                })
            }
            Effect::StartCapture { session } => {
                // The capture subscription is keyed by session id
                info!(session, "Starting capture");
                self.preview = None;
                Task::none()
            }
            Effect::StopCapture => {
                self.preview = None;
                Task::none()
            }
            Effect::ScheduleReset { generation, delay } => Task::perform(
                async move {
                    tokio::time::sleep(delay).await;
                    generation
                },
                |generation| cosmic::Action::App(Message::ResetScanner(generation)),
            ),
            Effect::OpenUrl(url) => {
                let opener = self.opener.clone();
                Task::perform(open_url_blocking(opener, url), |result| {
                    cosmic::Action::App(Message::HandoffFinished(result))
                })
            }
            Effect::OpenSettings => {
                if let Err(err) = self.opener.open_settings() {
                    error!(error = %err, "Failed to open camera settings");
                }
                Task::none()
            }
        }
    }

    // =========================================================================
    // Scanning Handlers
    // =========================================================================

    /// Permission is read fresh on every attempt
    pub(crate) fn handle_start_scan(&mut self) -> Task<cosmic::Action<Message>> {
        if self.coordinator.is_scanning() {
            return Task::none();
        }
        let permission = self.permission.clone();
        Task::perform(async move { permission.status().await }, |status| {
            cosmic::Action::App(Message::PermissionChecked(status))
        })
    }

    pub(crate) fn handle_permission_checked(
        &mut self,
        status: PermissionStatus,
    ) -> Task<cosmic::Action<Message>> {
        debug!(%status, "Camera permission checked");
        let effects = self.coordinator.start_scan(status);
        self.run_effects(effects)
    }

    pub(crate) fn handle_permission_requested(
        &mut self,
        result: Result<bool, PermissionError>,
    ) -> Task<cosmic::Action<Message>> {
        let granted = match result {
            Ok(granted) => granted,
            Err(err) => {
                warn!(error = %err, "Camera access request failed");
                false
            }
        };
        let effects = self.coordinator.permission_resolved(granted);
        self.run_effects(effects)
    }

    pub(crate) fn handle_cancel_scan(&mut self) -> Task<cosmic::Action<Message>> {
        let effects = self.coordinator.cancel_scan();
        self.run_effects(effects)
    }

    pub(crate) fn handle_capture_event(
        &mut self,
        session: u64,
        event: CaptureEvent,
    ) -> Task<cosmic::Action<Message>> {
        match event {
            // The subscription sends frames as PreviewFrame
            CaptureEvent::Frame(_) => Task::none(),
            CaptureEvent::Decoded(payload) => {
                let effects = self.coordinator.capture_decoded(session, payload);
                self.run_effects(effects)
            }
            CaptureEvent::Failed(err) => {
                let effects = self.coordinator.capture_failed(session, &err);
                self.run_effects(effects)
            }
        }
    }

    pub(crate) fn handle_preview_frame(
        &mut self,
        session: u64,
        handle: widget::image::Handle,
    ) -> Task<cosmic::Action<Message>> {
        if self.coordinator.is_scanning() && session == self.coordinator.session() {
            self.preview = Some(handle);
        }
        Task::none()
    }

    pub(crate) fn handle_reset_scanner(&mut self, generation: u64) -> Task<cosmic::Action<Message>> {
        self.coordinator.apply_reset(generation);
        Task::none()
    }

    // =========================================================================
    // Hand-off Handlers
    // =========================================================================

    pub(crate) fn handle_confirm_handoff(&mut self) -> Task<cosmic::Action<Message>> {
        let effects = self.coordinator.confirm_handoff();
        self.run_effects(effects)
    }

    pub(crate) fn handle_cancel_handoff(&mut self) -> Task<cosmic::Action<Message>> {
        let effects = self.coordinator.cancel_handoff();
        self.run_effects(effects)
    }

    pub(crate) fn handle_handoff_finished(
        &mut self,
        result: Result<(), HandoffError>,
    ) -> Task<cosmic::Action<Message>> {
        let effects = self.coordinator.handoff_finished(result);
        self.run_effects(effects)
    }

    pub(crate) fn handle_open_permission_settings(&mut self) -> Task<cosmic::Action<Message>> {
        let effects = self.coordinator.open_settings();
        self.run_effects(effects)
    }

    pub(crate) fn handle_dismiss_permission_alert(&mut self) -> Task<cosmic::Action<Message>> {
        self.coordinator.dismiss_permission_alert();
        Task::none()
    }

    // =========================================================================
    // Manual Entry Handlers
    // =========================================================================

    pub(crate) fn handle_show_manual_entry(&mut self) -> Task<cosmic::Action<Message>> {
        self.coordinator.show_manual_entry();
        widget::text_input::focus(manual_entry_id())
    }

    pub(crate) fn handle_dismiss_manual_entry(&mut self) -> Task<cosmic::Action<Message>> {
        self.coordinator.dismiss_manual_entry();
        Task::none()
    }

    pub(crate) fn handle_manual_input_changed(
        &mut self,
        text: String,
    ) -> Task<cosmic::Action<Message>> {
        self.coordinator.set_manual_input(text);
        Task::none()
    }

    pub(crate) fn handle_submit_manual_entry(&mut self) -> Task<cosmic::Action<Message>> {
        let effects = self.coordinator.submit_manual();
        self.run_effects(effects)
    }
}

/// Widget id of the manual entry field
pub(crate) fn manual_entry_id() -> widget::Id {
    widget::Id::new("manual-entry")
}
