// SPDX-License-Identifier: MPL-2.0

//! XDG desktop portal camera access
//!
//! Talks to `org.freedesktop.portal.Camera` over the session bus:
//! - `IsCameraPresent` tells whether the sandbox can see a camera at all
//! - `AccessCamera` shows the system prompt (or answers straight away when
//!   the user already decided) and replies through a `Request` object
//! - `OpenPipeWireRemote` hands out the PipeWire socket for capture

use super::{CameraPermission, PermissionFuture, PermissionStatus};
use crate::errors::PermissionError;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_BUS: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_IFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_IFACE: &str = "org.freedesktop.portal.Request";

const STORE_BUS: &str = "org.freedesktop.impl.portal.PermissionStore";
const STORE_PATH: &str = "/org/freedesktop/impl/portal/PermissionStore";
const STORE_TABLE: &str = "devices";
const STORE_ID: &str = "camera";

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Camera access through the desktop portal
#[derive(Debug, Clone)]
pub struct PortalPermission {
    app_id: String,
}

impl PortalPermission {
    /// `app_id` is used when the sandbox does not report `FLATPAK_ID`
    pub fn new(app_id: &str) -> Self {
        let app_id = std::env::var("FLATPAK_ID").unwrap_or_else(|_| app_id.to_string());
        Self { app_id }
    }

    async fn camera_proxy(
        connection: &zbus::Connection,
    ) -> Result<zbus::Proxy<'static>, PermissionError> {
        Ok(zbus::Proxy::new(connection, PORTAL_BUS, PORTAL_PATH, CAMERA_IFACE).await?)
    }

    async fn read_status(&self) -> Result<PermissionStatus, PermissionError> {
        let connection = zbus::Connection::session().await?;

        let camera = Self::camera_proxy(&connection).await?;
        let present: bool = camera.get_property("IsCameraPresent").await?;
        if !present {
            info!("Portal reports no camera present");
            return Ok(PermissionStatus::Restricted);
        }

        // The permission store is usually filtered out of the sandbox; the
        // access request then answers without a prompt if a decision exists.
        let store = match zbus::Proxy::new(&connection, STORE_BUS, STORE_PATH, STORE_BUS).await {
            Ok(store) => store,
            Err(e) => {
                debug!(error = %e, "Permission store unavailable");
                return Ok(PermissionStatus::NotDetermined);
            }
        };

        let lookup: zbus::Result<(HashMap<String, Vec<String>>, OwnedValue)> =
            store.call("Lookup", &(STORE_TABLE, STORE_ID)).await;

        match lookup {
            Ok((permissions, _data)) => Ok(status_from_store(&permissions, &self.app_id)),
            Err(e) => {
                debug!(error = %e, "Camera permission lookup failed");
                Ok(PermissionStatus::NotDetermined)
            }
        }
    }

    async fn access_camera(&self) -> Result<bool, PermissionError> {
        let connection = zbus::Connection::session().await?;

        let token = format!(
            "passkey_scanner_{}_{}",
            std::process::id(),
            REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let sender = connection
            .unique_name()
            .map(|name| sender_path_component(name.as_str()))
            .ok_or_else(|| PermissionError::Unavailable("no unique bus name".to_string()))?;
        let request_path = format!("{}/request/{}/{}", PORTAL_PATH, sender, token);

        // Subscribe before calling so a fast reply is not missed
        let request =
            zbus::Proxy::new(&connection, PORTAL_BUS, request_path.as_str(), REQUEST_IFACE)
                .await?;
        let mut responses = request.receive_signal("Response").await?;

        let mut options: HashMap<&str, Value> = HashMap::new();
        options.insert("handle_token", Value::new(token.as_str()));

        let camera = Self::camera_proxy(&connection).await?;
        let handle: OwnedObjectPath = camera
            .call("AccessCamera", &(options,))
            .await
            .map_err(|e| PermissionError::RequestFailed(e.to_string()))?;
        debug!(handle = %handle, "Camera access requested");

        let message = responses.next().await.ok_or_else(|| {
            PermissionError::RequestFailed("portal closed the request".to_string())
        })?;
        let (response, _results): (u32, HashMap<String, OwnedValue>) = message
            .body()
            .deserialize()
            .map_err(|e| PermissionError::RequestFailed(e.to_string()))?;

        info!(response, "Camera access request answered");
        Ok(response == 0)
    }

    /// Open the PipeWire remote that exposes the granted cameras
    pub async fn open_pipewire_remote() -> Result<std::os::fd::OwnedFd, PermissionError> {
        let connection = zbus::Connection::session().await?;
        let camera = Self::camera_proxy(&connection).await?;

        let options: HashMap<&str, Value> = HashMap::new();
        let fd: zbus::zvariant::OwnedFd = camera
            .call("OpenPipeWireRemote", &(options,))
            .await
            .map_err(|e| PermissionError::RequestFailed(e.to_string()))?;

        Ok(fd.into())
    }
}

impl CameraPermission for PortalPermission {
    fn status(&self) -> PermissionFuture<'_, PermissionStatus> {
        Box::pin(async move {
            match self.read_status().await {
                Ok(status) => status,
                Err(e) => {
                    warn!(error = %e, "Failed to read camera permission");
                    PermissionStatus::Unknown
                }
            }
        })
    }

    fn request(&self) -> PermissionFuture<'_, Result<bool, PermissionError>> {
        Box::pin(self.access_camera())
    }
}

/// Map a permission store entry for `app_id` to a status
fn status_from_store(permissions: &HashMap<String, Vec<String>>, app_id: &str) -> PermissionStatus {
    match permissions
        .get(app_id)
        .and_then(|values| values.first())
        .map(String::as_str)
    {
        Some("yes") => PermissionStatus::Authorized,
        Some("no") => PermissionStatus::Denied,
        Some("ask") | None => PermissionStatus::NotDetermined,
        Some(other) => {
            debug!(value = other, "Unrecognised camera permission value");
            PermissionStatus::Unknown
        }
    }
}

/// Request object paths use the caller's unique name without the leading
/// colon and with dots replaced by underscores
fn sender_path_component(unique_name: &str) -> String {
    unique_name.trim_start_matches(':').replace('.', "_")
}
