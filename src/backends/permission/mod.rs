// SPDX-License-Identifier: MPL-2.0

//! Camera permission backends
//!
//! Sandboxed builds go through the XDG camera portal. Native builds open the
//! device nodes directly and are always authorized.

pub mod portal;

use crate::constants::app_info;
use crate::errors::PermissionError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use portal::PortalPermission;

/// Camera authorization as seen by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Access granted
    Authorized,
    /// The user has not been asked yet
    NotDetermined,
    /// The user refused access
    Denied,
    /// Access blocked by policy or no camera exposed to the sandbox
    Restricted,
    /// Status the backend could not map; handled like `Denied`
    Unknown,
}

impl fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionStatus::Authorized => "authorized",
            PermissionStatus::NotDetermined => "not determined",
            PermissionStatus::Denied => "denied",
            PermissionStatus::Restricted => "restricted",
            PermissionStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Boxed future returned by [`CameraPermission`] methods
pub type PermissionFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reads and requests camera access
pub trait CameraPermission: Send + Sync {
    /// Current status, read fresh on every call
    fn status(&self) -> PermissionFuture<'_, PermissionStatus>;

    /// Ask the user for access; resolves to whether access was granted
    fn request(&self) -> PermissionFuture<'_, Result<bool, PermissionError>>;
}

/// Permission backend for unsandboxed builds
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePermission;

impl CameraPermission for NativePermission {
    fn status(&self) -> PermissionFuture<'_, PermissionStatus> {
        Box::pin(async { PermissionStatus::Authorized })
    }

    fn request(&self) -> PermissionFuture<'_, Result<bool, PermissionError>> {
        Box::pin(async { Ok(true) })
    }
}

/// Pick the permission backend for the current runtime environment
pub fn detect(app_id: &str) -> Arc<dyn CameraPermission> {
    if app_info::is_flatpak() {
        tracing::info!("Running sandboxed, using camera portal");
        Arc::new(PortalPermission::new(app_id))
    } else {
        tracing::debug!("Running natively, camera access is direct");
        Arc::new(NativePermission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_is_authorized() {
        let permission = NativePermission;
        assert_eq!(
            pollster::block_on(permission.status()),
            PermissionStatus::Authorized
        );
        assert_eq!(pollster::block_on(permission.request()), Ok(true));
    }
}
