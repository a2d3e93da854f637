// SPDX-License-Identifier: GPL-3.0-only

//! System handlers
//!
//! Handles camera discovery, settings and configuration updates.

use crate::app::state::{AppModel, CameraAvailability, Message};
use crate::backends::camera::{CameraBackendType, CameraDevice, enumerate_cameras, select_camera};
use crate::config::AppTheme;
use cosmic::Task;
use cosmic::cosmic_config::CosmicConfigEntry;
use tracing::{error, info};

impl AppModel {
    // =========================================================================
    // Camera Discovery
    // =========================================================================

    /// Enumerate cameras off the UI thread
    pub(crate) fn enumerate_cameras_task(
        backend: CameraBackendType,
    ) -> Task<cosmic::Action<Message>> {
        Task::perform(
            async move {
                info!(%backend, "Enumerating cameras asynchronously");
                // Probing spawns pw-cli and opens device nodes
                tokio::task::spawn_blocking(move || enumerate_cameras(backend))
                    .await
                    .unwrap_or_else(|err| {
                        error!(%err, "Camera enumeration task failed");
                        Vec::new()
                    })
            },
            |cameras| cosmic::Action::App(Message::CamerasInitialized(cameras)),
        )
    }

    pub(crate) fn handle_cameras_initialized(
        &mut self,
        cameras: Vec<CameraDevice>,
    ) -> Task<cosmic::Action<Message>> {
        let selected = select_camera(
            &cameras,
            self.config.last_camera_path.as_deref(),
            self.config.preferred_backend,
        );

        self.available_cameras = cameras;
        if let Some(selected) = selected {
            match self
                .available_cameras
                .iter()
                .position(|c| c.path == selected.path)
            {
                Some(index) => self.current_camera_index = index,
                None => {
                    // PipeWire default camera inside the sandbox
                    self.available_cameras.push(selected);
                    self.current_camera_index = self.available_cameras.len() - 1;
                }
            }
        } else {
            self.current_camera_index = 0;
        }

        self.camera_dropdown_options = self
            .available_cameras
            .iter()
            .map(|c| c.name.clone())
            .collect();

        if self.available_cameras.is_empty() {
            info!("No camera available, offering manual entry");
            self.camera_availability = CameraAvailability::Unavailable;
            self.coordinator.show_manual_entry();
        } else {
            info!(
                count = self.available_cameras.len(),
                index = self.current_camera_index,
                "Cameras initialized"
            );
            self.camera_availability = CameraAvailability::Available;
            self.coordinator.dismiss_manual_entry();
        }
        Task::none()
    }

    // =========================================================================
    // Settings Handlers
    // =========================================================================

    pub(crate) fn handle_select_camera(&mut self, index: usize) -> Task<cosmic::Action<Message>> {
        let Some(camera) = self.available_cameras.get(index) else {
            return Task::none();
        };
        info!(name = %camera.name, "Camera selected");
        self.current_camera_index = index;
        self.config.last_camera_path = Some(camera.path.clone());
        self.save_config("camera selection");

        // A running session keeps its camera; cancel so the next scan uses the new one
        let effects = self.coordinator.cancel_scan();
        self.run_effects(effects)
    }

    pub(crate) fn handle_select_backend(&mut self, index: usize) -> Task<cosmic::Action<Message>> {
        let Some(backend) = CameraBackendType::ALL.get(index).copied() else {
            return Task::none();
        };
        if backend == self.config.preferred_backend {
            return Task::none();
        }

        info!(%backend, "Camera backend changed");
        self.config.preferred_backend = backend;
        self.save_config("camera backend");

        let effects = self.coordinator.cancel_scan();
        self.camera_availability = CameraAvailability::Unknown;
        Task::batch([self.run_effects(effects), Self::enumerate_cameras_task(backend)])
    }

    pub(crate) fn handle_set_app_theme(&mut self, index: usize) -> Task<cosmic::Action<Message>> {
        let Some(app_theme) = AppTheme::ALL.get(index).copied() else {
            return Task::none();
        };

        info!(?app_theme, "Setting application theme");
        self.config.app_theme = app_theme;
        self.save_config("app theme");

        cosmic::command::set_theme(app_theme.theme())
    }

    pub(crate) fn handle_toggle_mirror_preview(&mut self) -> Task<cosmic::Action<Message>> {
        self.config.mirror_preview = !self.config.mirror_preview;
        info!(
            mirror_preview = self.config.mirror_preview,
            "Mirror preview toggled"
        );
        self.save_config("mirror preview");
        Task::none()
    }

    pub(crate) fn handle_update_config(
        &mut self,
        config: crate::config::Config,
    ) -> Task<cosmic::Action<Message>> {
        info!("UpdateConfig received");
        self.coordinator.set_reset_delay(config.reset_delay());
        self.config = config;
        Task::none()
    }

    fn save_config(&self, what: &str) {
        if let Some(handler) = self.config_handler.as_ref()
            && let Err(err) = self.config.write_entry(handler)
        {
            error!(?err, setting = what, "Failed to save setting");
        }
    }
}
