// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use passkey_scanner::app::AppModel;
use passkey_scanner::config::Config;
use passkey_scanner::constants::app_info;
use passkey_scanner::i18n;

mod cli;

#[derive(Parser)]
#[command(name = "passkey-scanner")]
#[command(about = "Scan passkey sign-in QR codes and hand them to the password manager")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (renders the camera preview to the terminal)
    Terminal,

    /// Hand a FIDO:/ payload to the system URL handler
    Handoff {
        /// Text of the QR code, e.g. FIDO:/1234567890
        payload: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=passkey_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Terminal) => {
            let (_, config) = Config::load(app_info::APP_ID);
            Ok(passkey_scanner::terminal::run(config)?)
        }
        Some(Commands::Handoff { payload }) => Ok(cli::handoff(payload)?),
        None => run_gui(),
    }
}

fn run_gui() -> Result<(), Box<dyn std::error::Error>> {
    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();

    // Enable localizations to be applied.
    i18n::init(&requested_languages);

    let settings = cosmic::app::Settings::default().size_limits(
        cosmic::iced::Limits::NONE
            .min_width(360.0)
            .min_height(420.0),
    );

    cosmic::app::run::<AppModel>(settings, ())?;

    Ok(())
}
