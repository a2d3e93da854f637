// SPDX-License-Identifier: GPL-3.0-only

//! Scan coordinator
//!
//! Holds the state of one scanner screen and decides what happens with a
//! decoded payload. The coordinator never performs I/O itself: every
//! operation returns the [`Effect`]s the front-end has to carry out
//! (starting the camera, asking for permission, opening a URL, ...).
//!
//! All methods must be called from the front-end's own thread; camera and
//! permission callbacks are marshaled there before they reach the
//! coordinator.

use crate::backends::permission::PermissionStatus;
use crate::constants::timing;
use crate::errors::{CaptureError, HandoffError, PayloadError};
use crate::scan::payload::HandoffUrl;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Which page the screen shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    /// Waiting for the user to start a scan
    #[default]
    Idle,
    /// Camera is live and looking for a code
    Scanning,
}

/// Modal alert shown on top of the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// Ask before handing the pending URL to the password manager
    ConfirmHandoff,
    /// Camera access was refused; offer the settings page
    PermissionRequired,
}

/// Side effect requested by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the user for camera access
    RequestPermission,
    /// Start a fresh capture session tagged with this id
    StartCapture { session: u64 },
    /// Tear down the running capture session
    StopCapture,
    /// Call [`ScanCoordinator::apply_reset`] with `generation` after `delay`
    ScheduleReset { generation: u64, delay: Duration },
    /// Hand the URL to the system
    OpenUrl(HandoffUrl),
    /// Open the desktop's camera privacy settings
    OpenSettings,
}

/// State holder for the scanner screen
#[derive(Debug, Clone)]
pub struct ScanCoordinator {
    state: ScanState,
    decoded: Option<String>,
    pending: Option<HandoffUrl>,
    alert: Option<Alert>,
    manual_input: String,
    manual_entry_visible: bool,
    session: u64,
    reset_generation: u64,
    reset_delay: Duration,
}

impl Default for ScanCoordinator {
    fn default() -> Self {
        Self::new(timing::RESET_DELAY)
    }
}

impl ScanCoordinator {
    /// Create an idle coordinator with the given reset delay
    pub fn new(reset_delay: Duration) -> Self {
        Self {
            state: ScanState::Idle,
            decoded: None,
            pending: None,
            alert: None,
            manual_input: String::new(),
            manual_entry_visible: false,
            session: 0,
            reset_generation: 0,
            reset_delay,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    pub fn alert(&self) -> Option<Alert> {
        self.alert
    }

    pub fn decoded(&self) -> Option<&str> {
        self.decoded.as_deref()
    }

    pub fn pending_url(&self) -> Option<&HandoffUrl> {
        self.pending.as_ref()
    }

    pub fn manual_input(&self) -> &str {
        &self.manual_input
    }

    pub fn manual_entry_visible(&self) -> bool {
        self.manual_entry_visible
    }

    /// Id of the current (or last) capture session
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn reset_delay(&self) -> Duration {
        self.reset_delay
    }

    pub fn set_reset_delay(&mut self, delay: Duration) {
        self.reset_delay = delay;
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Start a scan given the camera permission status read just now
    pub fn start_scan(&mut self, status: PermissionStatus) -> Vec<Effect> {
        if self.is_scanning() {
            debug!("Scan already running");
            return Vec::new();
        }

        match status {
            PermissionStatus::Authorized => self.enter_scanning(),
            PermissionStatus::NotDetermined => {
                info!("Camera permission not determined, requesting access");
                vec![Effect::RequestPermission]
            }
            PermissionStatus::Denied | PermissionStatus::Restricted | PermissionStatus::Unknown => {
                info!(?status, "Camera permission unavailable");
                self.alert = Some(Alert::PermissionRequired);
                Vec::new()
            }
        }
    }

    /// Result of an access request started by [`Effect::RequestPermission`]
    pub fn permission_resolved(&mut self, granted: bool) -> Vec<Effect> {
        if granted {
            info!("Camera access granted");
            self.enter_scanning()
        } else {
            info!("Camera access refused");
            self.alert = Some(Alert::PermissionRequired);
            Vec::new()
        }
    }

    /// Leave the camera page without decoding anything
    pub fn cancel_scan(&mut self) -> Vec<Effect> {
        if !self.is_scanning() {
            return Vec::new();
        }
        info!(session = self.session, "Scan cancelled");
        self.state = ScanState::Idle;
        vec![Effect::StopCapture]
    }

    /// First value decoded by capture session `session`
    pub fn capture_decoded(&mut self, session: u64, payload: String) -> Vec<Effect> {
        if !self.is_current_session(session) {
            debug!(session, current = self.session, "Dropping report from stale session");
            return Vec::new();
        }

        self.state = ScanState::Idle;
        let mut effects = vec![Effect::StopCapture];
        effects.extend(self.handle_decoded(payload));
        effects
    }

    /// Capture session `session` failed before decoding anything
    pub fn capture_failed(&mut self, session: u64, err: &CaptureError) -> Vec<Effect> {
        if !self.is_current_session(session) {
            debug!(session, current = self.session, "Dropping error from stale session");
            return Vec::new();
        }

        warn!(session, error = %err, "Scanning failed");
        self.state = ScanState::Idle;
        vec![Effect::StopCapture, self.reset_scanner()]
    }

    fn enter_scanning(&mut self) -> Vec<Effect> {
        self.session += 1;
        self.state = ScanState::Scanning;
        info!(session = self.session, "Scanning started");
        vec![Effect::StartCapture {
            session: self.session,
        }]
    }

    fn is_current_session(&self, session: u64) -> bool {
        self.is_scanning() && session == self.session
    }

    // =========================================================================
    // Payload handling
    // =========================================================================

    /// Decide what to do with a decoded or typed payload
    ///
    /// Payloads that are not FIDO hand-off requests are dropped silently.
    pub fn handle_decoded(&mut self, payload: String) -> Vec<Effect> {
        let result = HandoffUrl::parse(&payload);
        self.decoded = Some(payload);

        match result {
            Ok(url) => {
                info!(url = %url, "FIDO hand-off request decoded");
                // Invalidate resets scheduled by earlier attempts
                self.reset_generation += 1;
                self.pending = Some(url);
                self.alert = Some(Alert::ConfirmHandoff);
                Vec::new()
            }
            Err(PayloadError::NotFido) => {
                debug!("Ignoring payload without FIDO prefix");
                vec![self.reset_scanner()]
            }
            Err(err @ PayloadError::MalformedUrl(_)) => {
                debug!(error = %err, "Ignoring malformed FIDO payload");
                vec![self.reset_scanner()]
            }
        }
    }

    /// User accepted the hand-off
    pub fn confirm_handoff(&mut self) -> Vec<Effect> {
        if self.alert == Some(Alert::ConfirmHandoff) {
            self.alert = None;
        }

        match self.pending.take() {
            Some(url) => {
                info!(url = %url, "Hand-off confirmed");
                vec![Effect::OpenUrl(url)]
            }
            None => vec![self.reset_scanner()],
        }
    }

    /// Outcome of an [`Effect::OpenUrl`]
    pub fn handoff_finished(&mut self, result: Result<(), HandoffError>) -> Vec<Effect> {
        match result {
            Ok(()) => info!("Hand-off delivered"),
            Err(err) => error!(error = %err, "Failed to open URL"),
        }
        vec![self.reset_scanner()]
    }

    /// User declined the hand-off
    pub fn cancel_handoff(&mut self) -> Vec<Effect> {
        if self.alert == Some(Alert::ConfirmHandoff) {
            self.alert = None;
        }
        if let Some(url) = self.pending.take() {
            info!(url = %url, "Hand-off cancelled");
        }
        vec![self.reset_scanner()]
    }

    // =========================================================================
    // Permission alert
    // =========================================================================

    /// Close the permission alert and open the settings page
    pub fn open_settings(&mut self) -> Vec<Effect> {
        self.dismiss_permission_alert();
        vec![Effect::OpenSettings]
    }

    pub fn dismiss_permission_alert(&mut self) {
        if self.alert == Some(Alert::PermissionRequired) {
            self.alert = None;
        }
    }

    // =========================================================================
    // Manual entry
    // =========================================================================

    pub fn show_manual_entry(&mut self) {
        self.manual_entry_visible = true;
    }

    pub fn dismiss_manual_entry(&mut self) {
        self.manual_entry_visible = false;
    }

    pub fn set_manual_input(&mut self, text: String) {
        self.manual_input = text;
    }

    /// Submission is disabled while the field is empty
    pub fn can_submit_manual(&self) -> bool {
        !self.manual_input.is_empty()
    }

    /// Submit the typed text through the same path as a scanned code
    pub fn submit_manual(&mut self) -> Vec<Effect> {
        if !self.can_submit_manual() {
            return Vec::new();
        }
        self.manual_entry_visible = false;
        let payload = self.manual_input.clone();
        self.handle_decoded(payload)
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Schedule clearing the scan attempt after the reset delay
    pub fn reset_scanner(&mut self) -> Effect {
        self.reset_generation += 1;
        Effect::ScheduleReset {
            generation: self.reset_generation,
            delay: self.reset_delay,
        }
    }

    /// Apply a reset scheduled by [`Effect::ScheduleReset`]
    ///
    /// Returns false when a newer scan attempt superseded it.
    pub fn apply_reset(&mut self, generation: u64) -> bool {
        if generation != self.reset_generation {
            debug!(generation, current = self.reset_generation, "Skipping stale reset");
            return false;
        }

        self.decoded = None;
        self.pending = None;
        self.manual_input.clear();
        debug!("Scanner reset");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> ScanCoordinator {
        ScanCoordinator::new(Duration::from_millis(500))
    }

    fn reset_generation(effects: &[Effect]) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::ScheduleReset { generation, .. } => Some(*generation),
            _ => None,
        })
    }

    fn opens_url(effects: &[Effect]) -> bool {
        effects.iter().any(|e| matches!(e, Effect::OpenUrl(_)))
    }

    fn scanning(c: &mut ScanCoordinator) -> u64 {
        let effects = c.start_scan(PermissionStatus::Authorized);
        match effects.as_slice() {
            [Effect::StartCapture { session }] => *session,
            other => panic!("unexpected effects {:?}", other),
        }
    }

    #[test]
    fn test_authorized_starts_scanning() {
        let mut c = coordinator();
        let session = scanning(&mut c);
        assert_eq!(c.state(), ScanState::Scanning);
        assert_eq!(session, 1);
    }

    #[test]
    fn test_not_determined_requests_permission() {
        let mut c = coordinator();
        let effects = c.start_scan(PermissionStatus::NotDetermined);
        assert_eq!(effects, vec![Effect::RequestPermission]);
        assert_eq!(c.state(), ScanState::Idle);

        let effects = c.permission_resolved(true);
        assert_eq!(effects, vec![Effect::StartCapture { session: 1 }]);
        assert!(c.is_scanning());
    }

    #[test]
    fn test_refused_request_shows_alert() {
        let mut c = coordinator();
        c.start_scan(PermissionStatus::NotDetermined);
        let effects = c.permission_resolved(false);
        assert!(effects.is_empty());
        assert_eq!(c.state(), ScanState::Idle);
        assert_eq!(c.alert(), Some(Alert::PermissionRequired));
    }

    #[test]
    fn test_denied_never_scans() {
        for status in [
            PermissionStatus::Denied,
            PermissionStatus::Restricted,
            PermissionStatus::Unknown,
        ] {
            let mut c = coordinator();
            let effects = c.start_scan(status);
            assert!(effects.is_empty(), "{:?}", status);
            assert_eq!(c.state(), ScanState::Idle);
            assert_eq!(c.alert(), Some(Alert::PermissionRequired));
        }
    }

    #[test]
    fn test_open_settings_closes_alert() {
        let mut c = coordinator();
        c.start_scan(PermissionStatus::Denied);
        assert_eq!(c.open_settings(), vec![Effect::OpenSettings]);
        assert_eq!(c.alert(), None);

        c.start_scan(PermissionStatus::Denied);
        c.dismiss_permission_alert();
        assert_eq!(c.alert(), None);
        assert_eq!(c.state(), ScanState::Idle);
    }

    #[test]
    fn test_fido_payload_asks_for_confirmation() {
        let mut c = coordinator();
        let session = scanning(&mut c);

        let effects = c.capture_decoded(session, "FIDO:/1234567890ABCDEF".to_string());
        assert_eq!(effects, vec![Effect::StopCapture]);
        assert_eq!(c.state(), ScanState::Idle);
        assert_eq!(c.alert(), Some(Alert::ConfirmHandoff));
        assert_eq!(
            c.pending_url().map(HandoffUrl::as_str),
            Some("FIDO:/1234567890ABCDEF")
        );

        let effects = c.confirm_handoff();
        match effects.as_slice() {
            [Effect::OpenUrl(url)] => assert_eq!(url.as_str(), "FIDO:/1234567890ABCDEF"),
            other => panic!("unexpected effects {:?}", other),
        }
        assert_eq!(c.alert(), None);

        let effects = c.handoff_finished(Ok(()));
        let generation = reset_generation(&effects).unwrap();
        assert!(c.apply_reset(generation));
        assert_eq!(c.decoded(), None);
        assert_eq!(c.pending_url(), None);
    }

    #[test]
    fn test_cancel_never_opens() {
        let mut c = coordinator();
        c.handle_decoded("FIDO:/1234567890ABCDEF".to_string());

        let effects = c.cancel_handoff();
        assert!(!opens_url(&effects));
        assert_eq!(c.alert(), None);
        assert_eq!(c.pending_url(), None);

        // A late confirm after cancelling has nothing to open
        let effects = c.confirm_handoff();
        assert!(!opens_url(&effects));
    }

    #[test]
    fn test_non_fido_payload_is_ignored() {
        let mut c = coordinator();
        let effects = c.handle_decoded("hello world".to_string());
        assert_eq!(c.alert(), None);
        assert_eq!(c.pending_url(), None);

        let generation = reset_generation(&effects).unwrap();
        assert!(matches!(
            effects.as_slice(),
            [Effect::ScheduleReset { delay, .. }] if *delay == Duration::from_millis(500)
        ));
        assert!(c.apply_reset(generation));
        assert_eq!(c.state(), ScanState::Idle);
        assert_eq!(c.decoded(), None);
    }

    #[test]
    fn test_malformed_fido_payload_is_ignored() {
        let mut c = coordinator();
        let effects = c.handle_decoded("FIDO:/not a url".to_string());
        assert_eq!(c.alert(), None);
        assert_eq!(c.pending_url(), None);
        assert!(reset_generation(&effects).is_some());
    }

    #[test]
    fn test_lowercase_prefix_is_accepted() {
        let mut c = coordinator();
        c.handle_decoded("fido:/0123".to_string());
        assert_eq!(c.alert(), Some(Alert::ConfirmHandoff));
        assert_eq!(c.pending_url().map(HandoffUrl::as_str), Some("fido:/0123"));
    }

    #[test]
    fn test_failed_handoff_still_resets() {
        let mut c = coordinator();
        c.handle_decoded("FIDO:/42".to_string());
        c.confirm_handoff();

        let effects = c.handoff_finished(Err(HandoffError::OpenFailed {
            url: "FIDO:/42".to_string(),
            reason: "no handler".to_string(),
        }));
        let generation = reset_generation(&effects).unwrap();
        assert!(c.apply_reset(generation));
        assert_eq!(c.alert(), None);
    }

    #[test]
    fn test_cancel_scan_returns_to_idle() {
        let mut c = coordinator();
        scanning(&mut c);
        assert_eq!(c.cancel_scan(), vec![Effect::StopCapture]);
        assert_eq!(c.state(), ScanState::Idle);
        assert!(c.cancel_scan().is_empty());
    }

    #[test]
    fn test_stale_session_reports_are_dropped() {
        let mut c = coordinator();
        let first = scanning(&mut c);
        c.cancel_scan();
        let second = scanning(&mut c);
        assert_ne!(first, second);

        assert!(c.capture_decoded(first, "FIDO:/1".to_string()).is_empty());
        assert!(c.is_scanning());
        assert_eq!(c.alert(), None);

        let effects = c.capture_decoded(second, "FIDO:/2".to_string());
        assert_eq!(effects, vec![Effect::StopCapture]);

        // Only one report per session
        assert!(c.capture_decoded(second, "FIDO:/3".to_string()).is_empty());
        assert_eq!(c.pending_url().map(HandoffUrl::as_str), Some("FIDO:/2"));
    }

    #[test]
    fn test_capture_failure_returns_to_idle() {
        let mut c = coordinator();
        let session = scanning(&mut c);
        let effects = c.capture_failed(session, &CaptureError::EndOfStream);
        assert_eq!(effects.first(), Some(&Effect::StopCapture));
        assert!(reset_generation(&effects).is_some());
        assert_eq!(c.state(), ScanState::Idle);
        assert_eq!(c.alert(), None);
    }

    #[test]
    fn test_stale_reset_keeps_newer_request() {
        let mut c = coordinator();
        let effects = c.handle_decoded("nope".to_string());
        let stale = reset_generation(&effects).unwrap();

        c.handle_decoded("FIDO:/99".to_string());
        assert!(!c.apply_reset(stale));
        assert_eq!(c.alert(), Some(Alert::ConfirmHandoff));
        assert!(c.pending_url().is_some());
    }

    #[test]
    fn test_manual_entry_submission() {
        let mut c = coordinator();
        c.show_manual_entry();
        assert!(!c.can_submit_manual());
        assert!(c.submit_manual().is_empty());
        assert!(c.manual_entry_visible());

        c.set_manual_input("FIDO:/1234567890ABCDEF".to_string());
        assert!(c.can_submit_manual());
        c.submit_manual();
        assert!(!c.manual_entry_visible());
        assert_eq!(c.alert(), Some(Alert::ConfirmHandoff));

        let effects = c.cancel_handoff();
        let generation = reset_generation(&effects).unwrap();
        assert!(c.apply_reset(generation));
        assert_eq!(c.manual_input(), "");
    }
}
