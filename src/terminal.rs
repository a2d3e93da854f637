// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based scanner
//!
//! Drives the same scan coordinator as the GUI. The camera preview is drawn
//! with Unicode half-block characters for improved vertical resolution.
//!
//! Permission checks, capture start-up and the hand-off run on a tokio
//! runtime. Their results come back as [`Background`] messages which the
//! draw loop drains between frames, so keys and redraws keep working while
//! a portal dialog or the camera is slow to answer.

use crate::backends::camera::{
    CameraDevice, CameraSource, CaptureEvent, CaptureListener, CaptureOptions, CaptureSession,
    ChannelListener, LumaFrame, enumerate_cameras, select_camera,
};
use crate::backends::handoff::{SystemOpener, UrlOpener, open_url_blocking};
use crate::backends::permission::{self, CameraPermission, PermissionStatus, PortalPermission};
use crate::config::Config;
use crate::constants::{app_info, timing, ui};
use crate::errors::{AppResult, CaptureError, HandoffError, PermissionError};
use crate::scan::{Alert, Effect, HandoffUrl, ScanCoordinator};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::channel::mpsc;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::Color,
    widgets::{Paragraph, Widget, Wrap},
};
use std::future::Future;
use std::io::{self, stdout};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Preview frames buffered between the pipeline and the draw loop
const CAPTURE_CHANNEL_SIZE: usize = 8;

/// Run the terminal scanner
pub fn run(config: Config) -> AppResult<()> {
    gstreamer::init().map_err(|e| CaptureError::InitializationFailed(e.to_string()))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let cameras = enumerate_cameras(config.preferred_backend);
    let camera = select_camera(
        &cameras,
        config.last_camera_path.as_deref(),
        config.preferred_backend,
    );
    let mut scanner = TerminalScanner::new(
        runtime.handle().clone(),
        camera,
        permission::detect(app_info::APP_ID),
        Arc::new(SystemOpener),
        &config,
    );

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = scanner.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // A pending portal dialog must not keep the process alive
    drop(scanner);
    runtime.shutdown_background();

    result
}

/// Outcome of work spawned on the runtime
enum Background {
    PermissionChecked(PermissionStatus),
    PermissionRequested(Result<bool, PermissionError>),
    CaptureStarted {
        session: u64,
        capture: Option<CaptureSession>,
        events: mpsc::Receiver<CaptureEvent>,
    },
    HandoffFinished(Result<(), HandoffError>),
}

/// Capture session owned by the terminal loop
struct ActiveCapture {
    session: u64,
    _capture: Option<CaptureSession>,
    events: mpsc::Receiver<CaptureEvent>,
}

struct TerminalScanner {
    runtime: Handle,
    coordinator: ScanCoordinator,
    permission: Arc<dyn CameraPermission>,
    opener: Arc<dyn UrlOpener>,
    camera: Option<CameraDevice>,
    capture: Option<ActiveCapture>,
    background_tx: mpsc::UnboundedSender<Background>,
    background: mpsc::UnboundedReceiver<Background>,
    /// A permission check or request is in flight
    permission_pending: bool,
    /// Scheduled resets: (due, generation)
    resets: Vec<(Instant, u64)>,
    frame: FrameWidget,
    /// Last outcome shown in the status line
    notice: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

impl TerminalScanner {
    fn new(
        runtime: Handle,
        camera: Option<CameraDevice>,
        permission: Arc<dyn CameraPermission>,
        opener: Arc<dyn UrlOpener>,
        config: &Config,
    ) -> Self {
        let mut coordinator = ScanCoordinator::new(config.reset_delay());
        if camera.is_none() {
            coordinator.show_manual_entry();
        }
        let (background_tx, background) = mpsc::unbounded();

        Self {
            runtime,
            coordinator,
            permission,
            opener,
            camera,
            capture: None,
            background_tx,
            background,
            permission_pending: false,
            resets: Vec::new(),
            frame: FrameWidget::new(config.mirror_preview),
            notice: None,
        }
    }

    fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> AppResult<()> {
        loop {
            self.poll_background();
            self.poll_capture();
            self.apply_due_resets();

            terminal.draw(|f| {
                let area = f.area();
                let main_area = Rect {
                    height: area.height.saturating_sub(1),
                    ..area
                };
                let status_area = Rect {
                    y: area.y + area.height.saturating_sub(1),
                    height: 1,
                    ..area
                };

                if self.coordinator.is_scanning() && self.coordinator.alert().is_none() {
                    f.render_widget(&self.frame, main_area);
                } else {
                    f.render_widget(
                        Paragraph::new(self.panel_text())
                            .alignment(Alignment::Center)
                            .wrap(Wrap { trim: false }),
                        centered_rows(main_area, 9),
                    );
                }

                let message = self.status_message();
                f.render_widget(StatusBar { message: &message }, status_area);
            })?;

            if event::poll(timing::TERMINAL_POLL)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && let Flow::Quit = self.handle_key(key)
            {
                break;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Input
    // =========================================================================

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Flow::Quit;
        }

        match self.coordinator.alert() {
            Some(Alert::ConfirmHandoff) => {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => {
                        let effects = self.coordinator.confirm_handoff();
                        self.run_effects(effects);
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        let effects = self.coordinator.cancel_handoff();
                        self.run_effects(effects);
                    }
                    _ => {}
                }
                return Flow::Continue;
            }
            Some(Alert::PermissionRequired) => {
                match key.code {
                    KeyCode::Char('o') => {
                        let effects = self.coordinator.open_settings();
                        self.run_effects(effects);
                    }
                    KeyCode::Char('n') | KeyCode::Esc => {
                        self.coordinator.dismiss_permission_alert();
                    }
                    _ => {}
                }
                return Flow::Continue;
            }
            None => {}
        }

        if self.coordinator.manual_entry_visible() {
            self.handle_manual_key(key);
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char('s') if self.camera.is_some() => self.start_scan(),
            KeyCode::Char('m') if self.camera.is_none() => self.coordinator.show_manual_entry(),
            KeyCode::Esc => {
                let effects = self.coordinator.cancel_scan();
                self.run_effects(effects);
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_manual_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let effects = self.coordinator.submit_manual();
                self.run_effects(effects);
            }
            KeyCode::Esc => self.coordinator.dismiss_manual_entry(),
            KeyCode::Backspace => {
                let mut text = self.coordinator.manual_input().to_string();
                text.pop();
                self.coordinator.set_manual_input(text);
            }
            KeyCode::Char(c) => {
                let mut text = self.coordinator.manual_input().to_string();
                text.push(c);
                self.coordinator.set_manual_input(text);
            }
            _ => {}
        }
    }

    fn start_scan(&mut self) {
        if self.coordinator.is_scanning() || self.permission_pending {
            return;
        }
        self.notice = None;
        self.permission_pending = true;
        let permission = self.permission.clone();
        self.spawn(async move { Background::PermissionChecked(permission.status().await) });
    }

    /// Run `task` on the runtime and queue its result for the draw loop
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Background> + Send + 'static,
    {
        let sender = self.background_tx.clone();
        self.runtime.spawn(async move {
            if sender.unbounded_send(task.await).is_err() {
                debug!("Terminal scanner gone before background task finished");
            }
        });
    }

    // =========================================================================
    // Effects
    // =========================================================================

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::RequestPermission => {
                self.permission_pending = true;
                let permission = self.permission.clone();
                self.spawn(async move {
                    Background::PermissionRequested(permission.request().await)
                });
            }
            Effect::StartCapture { session } => self.start_capture(session),
            Effect::StopCapture => {
                self.capture = None;
                self.frame.clear();
            }
            Effect::ScheduleReset { generation, delay } => {
                self.resets.push((Instant::now() + delay, generation));
            }
            Effect::OpenUrl(url) => {
                self.notice = Some("Opening the password manager...".to_string());
                let opener = self.opener.clone();
                self.spawn(async move {
                    Background::HandoffFinished(open_url_blocking(opener, url).await)
                });
            }
            Effect::OpenSettings => {
                if let Err(e) = self.opener.open_settings() {
                    error!(error = %e, "Failed to open camera settings");
                    self.notice = Some(e.to_string());
                }
            }
        }
    }

    fn start_capture(&mut self, session: u64) {
        let Some(camera) = self.camera.clone() else {
            let effects = self
                .coordinator
                .capture_failed(session, &CaptureError::NoCameraFound);
            self.run_effects(effects);
            return;
        };

        info!(session, camera = %camera.name, "Starting terminal capture");
        self.spawn(start_capture_task(session, camera));
    }

    /// Apply finished background work
    fn poll_background(&mut self) {
        while let Ok(message) = self.background.try_recv() {
            match message {
                Background::PermissionChecked(status) => {
                    self.permission_pending = false;
                    debug!(%status, "Camera permission checked");
                    let effects = self.coordinator.start_scan(status);
                    self.run_effects(effects);
                }
                Background::PermissionRequested(result) => {
                    self.permission_pending = false;
                    let granted = match result {
                        Ok(granted) => granted,
                        Err(e) => {
                            warn!(error = %e, "Camera access request failed");
                            false
                        }
                    };
                    let effects = self.coordinator.permission_resolved(granted);
                    self.run_effects(effects);
                }
                Background::CaptureStarted {
                    session,
                    capture,
                    events,
                } => {
                    if !self.coordinator.is_scanning() || session != self.coordinator.session() {
                        // Dropping the session releases the camera
                        debug!(session, "Discarding capture for a finished scan");
                        continue;
                    }
                    info!(session, started = capture.is_some(), "Terminal capture");
                    self.capture = Some(ActiveCapture {
                        session,
                        _capture: capture,
                        events,
                    });
                }
                Background::HandoffFinished(result) => {
                    self.notice = Some(match &result {
                        Ok(()) => "Request handed to the password manager".to_string(),
                        Err(e) => format!("Hand-off failed: {}", e),
                    });
                    let effects = self.coordinator.handoff_finished(result);
                    self.run_effects(effects);
                }
            }
        }
    }

    fn poll_capture(&mut self) {
        let mut outcome = None;
        if let Some(active) = self.capture.as_mut() {
            // Drain to the newest frame
            while let Ok(event) = active.events.try_recv() {
                match event {
                    CaptureEvent::Frame(frame) => self.frame.update(frame),
                    other => {
                        outcome = Some((active.session, other));
                        break;
                    }
                }
            }
        }

        let effects = match outcome {
            Some((session, CaptureEvent::Decoded(payload))) => {
                self.coordinator.capture_decoded(session, payload)
            }
            Some((session, CaptureEvent::Failed(err))) => {
                self.notice = Some(format!("Camera error: {}", err));
                self.coordinator.capture_failed(session, &err)
            }
            _ => return,
        };
        self.run_effects(effects);
    }

    fn apply_due_resets(&mut self) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) =
            self.resets.drain(..).partition(|(at, _)| *at <= now);
        self.resets = pending;
        for (_, generation) in due {
            self.coordinator.apply_reset(generation);
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn panel_text(&self) -> String {
        match self.coordinator.alert() {
            Some(Alert::ConfirmHandoff) => {
                let url = self
                    .coordinator
                    .pending_url()
                    .map(HandoffUrl::as_str)
                    .unwrap_or_default();
                return format!(
                    "Open passkey request?\n\n{}\n\nThe request will be handed to your password manager.",
                    url
                );
            }
            Some(Alert::PermissionRequired) => {
                return "Camera access required\n\n\
                        Allow camera access in the system settings to scan QR codes."
                    .to_string();
            }
            None => {}
        }

        if self.coordinator.manual_entry_visible() {
            return format!(
                "Enter Code\n\n> {}_\n\nExample: {}",
                self.coordinator.manual_input(),
                ui::MANUAL_ENTRY_EXAMPLE
            );
        }

        match &self.camera {
            Some(camera) => format!(
                "Sign in with a passkey\n\nScan the QR code shown by the other device.\n\nCamera: {}",
                camera.name
            ),
            None => "Sign in with a passkey\n\nNo camera found.".to_string(),
        }
    }

    fn status_message(&self) -> String {
        if let Some(alert) = self.coordinator.alert() {
            return match alert {
                Alert::ConfirmHandoff => "'y' open | 'n' cancel".to_string(),
                Alert::PermissionRequired => "'o' open settings | 'n' dismiss".to_string(),
            };
        }
        if self.coordinator.manual_entry_visible() {
            let submit = if self.coordinator.can_submit_manual() {
                "Enter submit"
            } else {
                "type the code"
            };
            return format!("{} | Esc back", submit);
        }
        if self.coordinator.is_scanning() {
            return "Point the camera at the QR code | Esc cancel".to_string();
        }

        let keys = if self.camera.is_some() {
            "'s' scan | 'q' quit"
        } else {
            "'m' enter code | 'q' quit"
        };
        match &self.notice {
            Some(notice) => format!("{} | {}", notice, keys),
            None => keys.to_string(),
        }
    }
}

/// Open the camera off the draw loop
///
/// Start-up failures reach the loop through the capture channel, like any
/// other capture error.
async fn start_capture_task(session: u64, camera: CameraDevice) -> Background {
    let (listener, events) = ChannelListener::new(CAPTURE_CHANNEL_SIZE);
    let listener: Arc<dyn CaptureListener> = Arc::new(listener);

    let capture = match pipewire_remote(&camera).await {
        Ok(pipewire_fd) => {
            let options = CaptureOptions {
                pipewire_fd,
                ..Default::default()
            };
            let session_listener = listener.clone();
            match tokio::task::spawn_blocking(move || {
                CaptureSession::start(&camera, options, session_listener)
            })
            .await
            {
                Ok(started) => started.ok(),
                Err(e) => {
                    listener.on_error(CaptureError::InitializationFailed(e.to_string()));
                    None
                }
            }
        }
        Err(err) => {
            listener.on_error(err);
            None
        }
    };

    Background::CaptureStarted {
        session,
        capture,
        events,
    }
}

/// Sandboxed PipeWire access goes through the portal's remote
async fn pipewire_remote(camera: &CameraDevice) -> Result<Option<OwnedFd>, CaptureError> {
    if !app_info::is_flatpak() || !matches!(camera.source, CameraSource::PipeWire { .. }) {
        return Ok(None);
    }
    PortalPermission::open_pipewire_remote()
        .await
        .map(Some)
        .map_err(|e| CaptureError::InitializationFailed(e.to_string()))
}

/// `rows` tall band vertically centered in `area`
fn centered_rows(area: Rect, rows: u16) -> Rect {
    let height = rows.min(area.height);
    Rect {
        y: area.y + (area.height - height) / 2,
        height,
        ..area
    }
}

/// Widget that renders a grayscale frame using half-block characters
struct FrameWidget {
    frame: Option<LumaFrame>,
    mirrored: bool,
}

impl FrameWidget {
    fn new(mirrored: bool) -> Self {
        Self {
            frame: None,
            mirrored,
        }
    }

    fn update(&mut self, frame: LumaFrame) {
        self.frame = Some(frame);
    }

    fn clear(&mut self) {
        self.frame = None;
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            let msg = "Starting camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if frame.width == 0 || frame.height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let mut src_x = ((tx as f64 * x_scale) as u32).min(frame.width - 1);
                if self.mirrored {
                    src_x = frame.width - 1 - src_x;
                }
                let src_y_top = ((ty as f64 * 2.0 * y_scale) as u32).min(frame.height - 1);
                let src_y_bottom =
                    (((ty as f64 * 2.0 + 1.0) * y_scale) as u32).min(frame.height - 1);

                let top = frame.luma(src_x, src_y_top);
                let bottom = frame.luma(src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(Color::Rgb(top, top, top));
                    cell.set_bg(Color::Rgb(bottom, bottom, bottom));
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}
