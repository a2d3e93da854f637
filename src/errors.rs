// SPDX-License-Identifier: MPL-2.0

//! Error types for the passkey scanner

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera capture errors
    Capture(CaptureError),
    /// Hand-off errors
    Handoff(HandoffError),
    /// Terminal or file I/O errors
    Io(String),
    /// Generic error with message
    Other(String),
}

/// Errors reported by the camera capture adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No camera devices found
    NoCameraFound,
    /// Pipeline could not be built or started
    InitializationFailed(String),
    /// GStreamer reported an error while streaming
    Runtime(String),
    /// Stream ended before any code was decoded
    EndOfStream,
}

/// Errors talking to the camera permission backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// Session bus or portal unreachable
    Unavailable(String),
    /// Portal request failed
    RequestFailed(String),
}

/// Errors handing a URL over to the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    /// The system URL handler refused the URL
    OpenFailed { url: String, reason: String },
    /// No settings application could be launched
    NoSettingsApp,
}

/// Reasons a decoded payload is not handed off
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload does not start with the FIDO scheme token
    NotFido,
    /// Payload has the prefix but is not a valid URL
    MalformedUrl(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Handoff(e) => write!(f, "Hand-off error: {}", e),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoCameraFound => write!(f, "No camera devices found"),
            CaptureError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CaptureError::Runtime(msg) => write!(f, "Stream error: {}", msg),
            CaptureError::EndOfStream => write!(f, "Camera stream ended"),
        }
    }
}

impl fmt::Display for PermissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionError::Unavailable(msg) => write!(f, "Portal unavailable: {}", msg),
            PermissionError::RequestFailed(msg) => write!(f, "Access request failed: {}", msg),
        }
    }
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffError::OpenFailed { url, reason } => {
                write!(f, "Failed to open {}: {}", url, reason)
            }
            HandoffError::NoSettingsApp => write!(f, "No settings application found"),
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::NotFido => write!(f, "Not a FIDO hand-off request"),
            PayloadError::MalformedUrl(msg) => write!(f, "Malformed URL: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for PermissionError {}
impl std::error::Error for HandoffError {}
impl std::error::Error for PayloadError {}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<HandoffError> for AppError {
    fn from(err: HandoffError) -> Self {
        AppError::Handoff(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<zbus::Error> for PermissionError {
    fn from(err: zbus::Error) -> Self {
        PermissionError::Unavailable(err.to_string())
    }
}
