// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use passkey_scanner::Config;
use passkey_scanner::backends::camera::CameraBackendType;
use passkey_scanner::config::AppTheme;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(
        config.mirror_preview,
        "Mirror preview should be enabled by default"
    );
    assert_eq!(config.app_theme, AppTheme::System);
    assert_eq!(config.preferred_backend, CameraBackendType::Auto);
    assert!(config.last_camera_path.is_none());
}

#[test]
fn test_default_reset_delay_is_half_a_second() {
    let config = Config::default();
    assert_eq!(config.reset_delay(), Duration::from_millis(500));
}

#[test]
fn test_reset_delay_follows_setting() {
    let config = Config {
        reset_delay_ms: 1200,
        ..Config::default()
    };
    assert_eq!(config.reset_delay(), Duration::from_millis(1200));
}

#[test]
fn test_theme_list_covers_every_variant() {
    assert_eq!(AppTheme::ALL.len(), 3);
    assert_eq!(AppTheme::ALL[0], AppTheme::default());
}
