// SPDX-License-Identifier: GPL-3.0-only

//! Hand-off to the system URL handler
//!
//! FIDO URLs are opened with whatever application claims the `FIDO` scheme
//! (`x-scheme-handler/fido`), normally the password manager.

use crate::constants::app_info;
use crate::errors::HandoffError;
use crate::scan::HandoffUrl;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info};

/// Opens URLs and the camera settings page
pub trait UrlOpener: Send + Sync {
    /// Ask the system to open `url`
    fn open_url(&self, url: &HandoffUrl) -> Result<(), HandoffError>;

    /// Open the desktop's camera privacy settings
    fn open_settings(&self) -> Result<(), HandoffError>;
}

/// Settings launchers tried in order: (program, arguments)
const SETTINGS_APPS: &[(&str, &[&str])] = &[
    ("cosmic-settings", &[]),
    ("gnome-control-center", &["camera"]),
    ("systemsettings", &["kcm_camera"]),
];

/// Opens URLs through `xdg-open` and friends
///
/// `open_url` waits for the launcher to exit so a missing scheme handler
/// surfaces as an error. Call it off the UI thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open_url(&self, url: &HandoffUrl) -> Result<(), HandoffError> {
        info!(url = %url, "Handing URL to the system");
        open::that(url.as_str()).map_err(|e| HandoffError::OpenFailed {
            url: url.as_str().to_string(),
            reason: e.to_string(),
        })
    }

    fn open_settings(&self) -> Result<(), HandoffError> {
        for (program, args) in SETTINGS_APPS {
            match settings_command(program, args).spawn() {
                Ok(child) => {
                    info!(program, "Opened settings");
                    drop(child);
                    return Ok(());
                }
                Err(e) => debug!(program, error = %e, "Settings launcher unavailable"),
            }
        }
        Err(HandoffError::NoSettingsApp)
    }
}

/// Run [`UrlOpener::open_url`] on the blocking pool
pub async fn open_url_blocking(
    opener: Arc<dyn UrlOpener>,
    url: HandoffUrl,
) -> Result<(), HandoffError> {
    let target = url.as_str().to_string();
    tokio::task::spawn_blocking(move || opener.open_url(&url))
        .await
        .unwrap_or_else(|e| {
            Err(HandoffError::OpenFailed {
                url: target,
                reason: e.to_string(),
            })
        })
}

/// Launchers live on the host when sandboxed
fn settings_command(program: &str, args: &[&str]) -> Command {
    if app_info::is_flatpak() {
        let mut command = Command::new("flatpak-spawn");
        command.arg("--host").arg(program).args(args);
        command
    } else {
        let mut command = Command::new(program);
        command.args(args);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingOpener;

    impl UrlOpener for RefusingOpener {
        fn open_url(&self, url: &HandoffUrl) -> Result<(), HandoffError> {
            Err(HandoffError::OpenFailed {
                url: url.as_str().to_string(),
                reason: "no application registered for scheme".to_string(),
            })
        }

        fn open_settings(&self) -> Result<(), HandoffError> {
            Err(HandoffError::NoSettingsApp)
        }
    }

    struct PanickingOpener;

    impl UrlOpener for PanickingOpener {
        fn open_url(&self, _url: &HandoffUrl) -> Result<(), HandoffError> {
            panic!("launcher crashed");
        }

        fn open_settings(&self) -> Result<(), HandoffError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_open_url_blocking_returns_launcher_failure() {
        let url = HandoffUrl::parse("FIDO:/1234567890ABCDEF").unwrap();
        let result = open_url_blocking(Arc::new(RefusingOpener), url).await;
        assert_eq!(
            result,
            Err(HandoffError::OpenFailed {
                url: "FIDO:/1234567890ABCDEF".to_string(),
                reason: "no application registered for scheme".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_open_url_blocking_maps_panicked_launcher() {
        let url = HandoffUrl::parse("FIDO:/1234567890ABCDEF").unwrap();
        let result = open_url_blocking(Arc::new(PanickingOpener), url).await;
        assert!(matches!(
            result,
            Err(HandoffError::OpenFailed { url, .. }) if url == "FIDO:/1234567890ABCDEF"
        ));
    }

    #[test]
    fn test_settings_command_runs_program_directly_outside_sandbox() {
        if app_info::is_flatpak() {
            return;
        }
        let command = settings_command("gnome-control-center", &["camera"]);
        assert_eq!(command.get_program(), "gnome-control-center");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, ["camera"]);
    }
}
