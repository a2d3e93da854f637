// SPDX-License-Identifier: MPL-2.0

//! End-to-end scan flows through the public coordinator API

use passkey_scanner::backends::camera::{CameraSource, enumeration};
use passkey_scanner::backends::handoff::{UrlOpener, open_url_blocking};
use passkey_scanner::backends::permission::PermissionStatus;
use passkey_scanner::errors::{CaptureError, HandoffError};
use passkey_scanner::scan::HandoffUrl;
use passkey_scanner::{Alert, Effect, ScanCoordinator, ScanState};
use std::sync::Arc;
use std::time::Duration;

/// Stands in for a desktop with no handler registered for `fido:`
struct NoSchemeHandler;

impl UrlOpener for NoSchemeHandler {
    fn open_url(&self, url: &HandoffUrl) -> Result<(), HandoffError> {
        Err(HandoffError::OpenFailed {
            url: url.as_str().to_string(),
            reason: "xdg-open exited with status 4".to_string(),
        })
    }

    fn open_settings(&self) -> Result<(), HandoffError> {
        Err(HandoffError::NoSettingsApp)
    }
}

fn started_session(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|e| match e {
            Effect::StartCapture { session } => Some(*session),
            _ => None,
        })
        .expect("scan should start a capture session")
}

fn scheduled_reset(effects: &[Effect]) -> Option<u64> {
    effects.iter().find_map(|e| match e {
        Effect::ScheduleReset { generation, .. } => Some(*generation),
        _ => None,
    })
}

#[test]
fn test_scan_confirm_and_handoff() {
    let mut coordinator = ScanCoordinator::new(Duration::from_millis(500));
    let session = started_session(&coordinator.start_scan(PermissionStatus::Authorized));
    assert_eq!(coordinator.state(), ScanState::Scanning);

    let effects = coordinator.capture_decoded(session, "fido:/1234".to_string());
    assert!(effects.contains(&Effect::StopCapture));
    assert_eq!(coordinator.state(), ScanState::Idle);
    assert_eq!(coordinator.alert(), Some(Alert::ConfirmHandoff));
    // The original text is handed off unchanged
    assert_eq!(
        coordinator.pending_url().map(|u| u.as_str()),
        Some("fido:/1234")
    );

    let effects = coordinator.confirm_handoff();
    let url = match effects.as_slice() {
        [Effect::OpenUrl(url)] => url.clone(),
        other => panic!("unexpected effects: {:?}", other),
    };
    assert_eq!(url.as_str(), "fido:/1234");

    let effects = coordinator.handoff_finished(Ok(()));
    let generation = scheduled_reset(&effects).expect("reset scheduled");
    assert!(coordinator.apply_reset(generation));
    assert!(coordinator.decoded().is_none());
    assert!(coordinator.pending_url().is_none());
}

#[tokio::test]
async fn test_failed_handoff_still_resets_scanner() {
    let mut coordinator = ScanCoordinator::new(Duration::from_millis(500));
    let session = started_session(&coordinator.start_scan(PermissionStatus::Authorized));
    coordinator.capture_decoded(session, "FIDO:/1234567890".to_string());

    let url = match coordinator.confirm_handoff().as_slice() {
        [Effect::OpenUrl(url)] => url.clone(),
        other => panic!("unexpected effects: {:?}", other),
    };
    let result = open_url_blocking(Arc::new(NoSchemeHandler), url).await;
    assert!(matches!(result, Err(HandoffError::OpenFailed { .. })));

    let effects = coordinator.handoff_finished(result);
    let generation = scheduled_reset(&effects).expect("reset scheduled");
    assert!(coordinator.apply_reset(generation));
    assert_eq!(coordinator.alert(), None);
    assert!(coordinator.pending_url().is_none());
    assert!(coordinator.decoded().is_none());

    // A fresh attempt works after the failure
    started_session(&coordinator.start_scan(PermissionStatus::Authorized));
    assert!(coordinator.is_scanning());
}

#[test]
fn test_permission_request_then_scan() {
    let mut coordinator = ScanCoordinator::default();
    let effects = coordinator.start_scan(PermissionStatus::NotDetermined);
    assert_eq!(effects, vec![Effect::RequestPermission]);
    assert_eq!(coordinator.state(), ScanState::Idle);

    let effects = coordinator.permission_resolved(true);
    started_session(&effects);
    assert!(coordinator.is_scanning());
}

#[test]
fn test_denied_permission_offers_settings() {
    let mut coordinator = ScanCoordinator::default();
    assert!(coordinator.start_scan(PermissionStatus::Denied).is_empty());
    assert_eq!(coordinator.alert(), Some(Alert::PermissionRequired));
    assert!(!coordinator.is_scanning());

    assert_eq!(coordinator.open_settings(), vec![Effect::OpenSettings]);
    assert_eq!(coordinator.alert(), None);
}

#[test]
fn test_non_fido_code_is_ignored() {
    let mut coordinator = ScanCoordinator::default();
    let session = started_session(&coordinator.start_scan(PermissionStatus::Authorized));

    let effects = coordinator.capture_decoded(session, "https://example.com".to_string());
    assert_eq!(coordinator.alert(), None);
    assert!(coordinator.pending_url().is_none());
    let generation = scheduled_reset(&effects).expect("reset scheduled");
    assert!(coordinator.apply_reset(generation));
}

#[test]
fn test_capture_failure_returns_to_idle() {
    let mut coordinator = ScanCoordinator::default();
    let session = started_session(&coordinator.start_scan(PermissionStatus::Authorized));

    let effects = coordinator.capture_failed(session, &CaptureError::NoCameraFound);
    assert!(effects.contains(&Effect::StopCapture));
    assert!(scheduled_reset(&effects).is_some());
    assert_eq!(coordinator.state(), ScanState::Idle);
    assert_eq!(coordinator.alert(), None);
}

#[test]
fn test_reports_from_old_sessions_are_dropped() {
    let mut coordinator = ScanCoordinator::default();
    let first = started_session(&coordinator.start_scan(PermissionStatus::Authorized));
    coordinator.cancel_scan();
    let second = started_session(&coordinator.start_scan(PermissionStatus::Authorized));
    assert_ne!(first, second);

    assert!(coordinator.capture_decoded(first, "FIDO:/1".to_string()).is_empty());
    assert!(coordinator.is_scanning());
    assert_eq!(coordinator.alert(), None);
}

#[test]
fn test_manual_entry_flow() {
    let mut coordinator = ScanCoordinator::default();
    coordinator.show_manual_entry();
    assert!(!coordinator.can_submit_manual());
    assert!(coordinator.submit_manual().is_empty());

    coordinator.set_manual_input("FIDO:/42".to_string());
    assert!(coordinator.can_submit_manual());
    coordinator.submit_manual();
    assert!(!coordinator.manual_entry_visible());
    assert_eq!(coordinator.alert(), Some(Alert::ConfirmHandoff));

    let effects = coordinator.cancel_handoff();
    let generation = scheduled_reset(&effects).expect("reset scheduled");
    assert!(coordinator.apply_reset(generation));
    assert!(coordinator.manual_input().is_empty());
}

#[test]
fn test_pw_cli_parsing_through_public_api() {
    let output = r#"	id 57, type PipeWire:Interface:Node/3
 		object.serial = "812"
 		node.description = "Integrated Camera"
 		media.class = "Video/Source"
	id 58, type PipeWire:Interface:Node/3
 		node.description = "Speakers"
 		media.class = "Audio/Sink"
"#;
    let cameras = enumeration::parse_pw_cli_nodes(output);
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0].name, "Integrated Camera");
    assert!(matches!(cameras[0].source, CameraSource::PipeWire { .. }));
}
