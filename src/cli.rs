// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! `handoff` is the manual-entry fallback for sessions without a display:
//! the payload goes through the scan coordinator exactly like typed text.

use passkey_scanner::backends::handoff::{SystemOpener, UrlOpener};
use passkey_scanner::errors::{AppError, AppResult};
use passkey_scanner::scan::{Alert, Effect, ScanCoordinator};
use std::io::{self, BufRead, Write};

/// Hand a payload typed on the command line to the system URL handler
pub fn handoff(payload: String) -> AppResult<()> {
    let mut coordinator = ScanCoordinator::default();
    submit(&mut coordinator, payload)?;
    confirm_and_open(&mut coordinator, &SystemOpener, &mut io::stdin().lock())
}

fn submit(coordinator: &mut ScanCoordinator, payload: String) -> AppResult<()> {
    coordinator.show_manual_entry();
    coordinator.set_manual_input(payload);
    coordinator.submit_manual();

    if coordinator.alert() != Some(Alert::ConfirmHandoff) {
        return Err(AppError::Other(format!(
            "Not a passkey request: {}",
            coordinator.decoded().unwrap_or_default()
        )));
    }
    Ok(())
}

/// Ask on `input`, then run the coordinator's hand-off effects
fn confirm_and_open(
    coordinator: &mut ScanCoordinator,
    opener: &dyn UrlOpener,
    input: &mut dyn BufRead,
) -> AppResult<()> {
    let url = coordinator
        .pending_url()
        .map(|url| url.as_str().to_string())
        .unwrap_or_default();

    print!("Open {} with the system handler? [y/N] ", url);
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;

    if !is_affirmative(&answer) {
        coordinator.cancel_handoff();
        println!("Cancelled.");
        return Ok(());
    }

    for effect in coordinator.confirm_handoff() {
        if let Effect::OpenUrl(url) = effect {
            let result = opener.open_url(&url);
            coordinator.handoff_finished(result.clone());
            result?;
            println!("Handed off to the system URL handler.");
        }
    }

    Ok(())
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
