// SPDX-License-Identifier: MPL-2.0

//! Main application module for Passkey Scanner
//!
//! This module contains the application state, message handling, UI rendering,
//! and the capture subscription for the scanner.
//!
//! # Architecture
//!
//! - `state`: Application state types (AppModel, Message, ContextPage)
//! - `handlers`: Message handlers grouped by domain
//! - `settings`: Settings drawer UI
//! - `view`: Main view rendering
//! - `update`: Message dispatch

mod handlers;
pub mod settings;
mod state;
mod update;
mod view;

use crate::backends::camera::{
    CameraBackendType, CameraSource, CaptureEvent, CaptureOptions, CaptureSession,
    ChannelListener,
};
use crate::backends::handoff::SystemOpener;
use crate::backends::permission::{self, PortalPermission};
use crate::config::{AppTheme, Config};
use crate::constants::app_info;
use crate::errors::CaptureError;
use crate::fl;
use crate::scan::ScanCoordinator;
use cosmic::app::context_drawer;
use cosmic::iced::Subscription;
use cosmic::widget::{self, about::About};
use cosmic::{Element, Task};
pub use state::{AppModel, CameraAvailability, ContextPage, Message};
use std::sync::Arc;
use tracing::{error, info, warn};

const REPOSITORY: &str = "https://github.com/cosmic-utils/passkey-scanner";
const APP_ICON: &[u8] = include_bytes!(
    "../../resources/icons/hicolor/scalable/apps/io.github.cosmic_utils.PasskeyScanner.svg"
);

/// Capacity of the channel carrying capture events to the UI
const CAPTURE_CHANNEL_SIZE: usize = 4;

impl cosmic::Application for AppModel {
    /// The async executor that will be used to run your application's commands.
    type Executor = cosmic::executor::Default;

    /// Data that your application receives to its init method.
    type Flags = ();

    /// Messages which the application and its widgets will emit.
    type Message = Message;

    /// Unique identifier in RDNN (reverse domain name notation) format.
    const APP_ID: &'static str = app_info::APP_ID;

    fn core(&self) -> &cosmic::Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut cosmic::Core {
        &mut self.core
    }

    /// Initializes the application with any given flags and startup commands.
    fn init(
        core: cosmic::Core,
        _flags: Self::Flags,
    ) -> (Self, Task<cosmic::Action<Self::Message>>) {
        let about = About::default()
            .name(fl!("app-title"))
            .icon(widget::icon::from_svg_bytes(APP_ICON))
            .version(env!("GIT_VERSION"))
            .links([(fl!("repository"), REPOSITORY)])
            .license(env!("CARGO_PKG_LICENSE"));

        let (config_handler, config) = Config::load(Self::APP_ID);

        // Required before any GStreamer calls
        if let Err(e) = gstreamer::init() {
            error!(error = %e, "Failed to initialize GStreamer");
        }

        info!(
            environment = app_info::runtime_environment(),
            version = app_info::version(),
            "Starting scanner"
        );

        let app = AppModel {
            core,
            context_page: ContextPage::default(),
            about,
            coordinator: ScanCoordinator::new(config.reset_delay()),
            permission: permission::detect(Self::APP_ID),
            opener: Arc::new(SystemOpener),
            available_cameras: Vec::new(),
            current_camera_index: 0,
            camera_availability: CameraAvailability::Unknown,
            preview: None,
            camera_dropdown_options: Vec::new(),
            theme_dropdown_options: vec![
                fl!("theme-system"),
                fl!("theme-dark"),
                fl!("theme-light"),
            ],
            backend_dropdown_options: CameraBackendType::ALL
                .iter()
                .map(|b| b.display_name().to_string())
                .collect(),
            config,
            config_handler,
        };

        let mut tasks = vec![Self::enumerate_cameras_task(app.config.preferred_backend)];
        if app.config.app_theme != AppTheme::System {
            tasks.push(cosmic::command::set_theme(app.config.app_theme.theme()));
        }

        (app, Task::batch(tasks))
    }

    /// Elements to pack at the end of the header bar.
    fn header_end(&self) -> Vec<Element<'_, Self::Message>> {
        vec![
            widget::button::icon(widget::icon::from_name("help-about-symbolic"))
                .on_press(Message::ToggleContextPage(ContextPage::About))
                .into(),
            widget::button::icon(widget::icon::from_name("preferences-system-symbolic"))
                .on_press(Message::ToggleContextPage(ContextPage::Settings))
                .into(),
        ]
    }

    /// Display a context drawer if the context page is requested.
    fn context_drawer(&self) -> Option<context_drawer::ContextDrawer<'_, Self::Message>> {
        if !self.core.window.show_context {
            return None;
        }

        Some(match self.context_page {
            ContextPage::About => context_drawer::about(
                &self.about,
                |url| Message::LaunchUrl(url.to_string()),
                Message::ToggleContextPage(ContextPage::About),
            ),
            ContextPage::Settings => self.settings_view(),
        })
    }

    fn dialog(&self) -> Option<Element<'_, Self::Message>> {
        self.dialog_view()
    }

    /// Describes the interface based on the current state of the application model.
    fn view(&self) -> Element<'_, Self::Message> {
        self.view()
    }

    /// Register subscriptions for this application.
    fn subscription(&self) -> Subscription<Self::Message> {
        let config_sub = self
            .core()
            .watch_config::<Config>(Self::APP_ID)
            .map(|update| Message::UpdateConfig(update.config));

        let capture_sub = match self.current_camera() {
            Some(camera) if self.coordinator.is_scanning() => {
                capture_subscription(
                    self.coordinator.session(),
                    camera.clone(),
                    self.config.mirror_preview,
                )
            }
            _ => Subscription::none(),
        };

        Subscription::batch([config_sub, capture_sub])
    }

    /// Handle application events here.
    fn update(&mut self, message: Self::Message) -> Task<cosmic::Action<Self::Message>> {
        self.update(message)
    }
}

/// Capture session for scan `session`
///
/// The session lives as long as the subscription does: it is dropped, and the
/// camera released, once the coordinator leaves the scanning state.
fn capture_subscription(
    session: u64,
    camera: crate::backends::camera::CameraDevice,
    mirror: bool,
) -> Subscription<Message> {
    use cosmic::iced::futures::{SinkExt, StreamExt};

    Subscription::run_with_id(
        ("capture", session),
        cosmic::iced::stream::channel(CAPTURE_CHANNEL_SIZE, move |mut output| async move {
            info!(session, camera = %camera.name, "Capture subscription started");

            // Sandboxed PipeWire access goes through the portal's remote
            let pipewire_fd = if app_info::is_flatpak()
                && matches!(camera.source, CameraSource::PipeWire { .. })
            {
                match PortalPermission::open_pipewire_remote().await {
                    Ok(fd) => Some(fd),
                    Err(e) => {
                        let err = CaptureError::InitializationFailed(e.to_string());
                        let _ = output
                            .send(Message::Capture(session, CaptureEvent::Failed(err)))
                            .await;
                        return;
                    }
                }
            } else {
                None
            };

            let (listener, mut events) = ChannelListener::new(CAPTURE_CHANNEL_SIZE);
            let options = CaptureOptions {
                pipewire_fd,
                ..Default::default()
            };

            // Pipeline start-up blocks while the device opens
            let started = tokio::task::spawn_blocking(move || {
                CaptureSession::start(&camera, options, Arc::new(listener))
            })
            .await;

            let _capture = match started {
                Ok(Ok(capture)) => Some(capture),
                // The failure was already delivered through the listener
                Ok(Err(_)) => None,
                Err(e) => {
                    error!(error = %e, "Capture start-up task failed");
                    let err = CaptureError::InitializationFailed(e.to_string());
                    let _ = output
                        .send(Message::Capture(session, CaptureEvent::Failed(err)))
                        .await;
                    return;
                }
            };

            while let Some(event) = events.next().await {
                let message = capture_message(session, event, mirror);
                if output.send(message).await.is_err() {
                    warn!(session, "Capture output closed");
                    break;
                }
            }

            info!(session, "Capture subscription finished");
        }),
    )
}

/// Turn a capture event into a UI message
///
/// Preview frames are converted to RGBA here, on the subscription's executor,
/// so `update` only swaps the image handle.
fn capture_message(session: u64, event: CaptureEvent, mirror: bool) -> Message {
    match event {
        CaptureEvent::Frame(frame) => Message::PreviewFrame(
            session,
            widget::image::Handle::from_rgba(frame.width, frame.height, frame.to_rgba(mirror)),
        ),
        other => Message::Capture(session, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::LumaFrame;

    #[test]
    fn test_capture_frames_arrive_as_preview_handles() {
        let frame = LumaFrame::from_packed(2, 1, vec![0, 255]);
        let message = capture_message(3, CaptureEvent::Frame(frame), true);
        assert!(matches!(message, Message::PreviewFrame(3, _)));
    }

    #[test]
    fn test_capture_outcomes_pass_through() {
        let message = capture_message(3, CaptureEvent::Decoded("FIDO:/1".to_string()), false);
        assert!(matches!(
            message,
            Message::Capture(3, CaptureEvent::Decoded(payload)) if payload == "FIDO:/1"
        ));
    }
}
