// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the media broker
//!
//! Two layers:
//! - [`PickError`]: user-facing failures that end a pick session. These are
//!   only ever delivered through the session's completion, never returned.
//! - [`PickerError`]: crate-level errors (usage mistakes, configuration,
//!   storage, platform backends) returned synchronously to the caller.

use crate::types::MediaSourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type alias using PickerError
pub type PickerResult<T> = Result<T, PickerError>;

/// Classification of a failed pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickErrorKind {
    /// No requested source is both capable and authorizable
    NoSourceAvailable,
    /// The user explicitly refused access
    PermissionDenied,
    /// Access is denied by policy, not by the user
    PermissionRestricted,
    /// The hardware or platform service for a source is missing
    DeviceCapabilityMissing,
    /// The capture or library UI reported a failure
    NativeCaptureError,
    /// The last-photo accessor found no asset
    NotFound,
}

impl PickErrorKind {
    /// Short human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            PickErrorKind::NoSourceAvailable => "No media source available",
            PickErrorKind::PermissionDenied => "Permission denied",
            PickErrorKind::PermissionRestricted => "Permission restricted",
            PickErrorKind::DeviceCapabilityMissing => "Device capability missing",
            PickErrorKind::NativeCaptureError => "Capture failed",
            PickErrorKind::NotFound => "Not found",
        }
    }
}

impl fmt::Display for PickErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A failed pick: a kind plus a message for logs and diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickError {
    pub kind: PickErrorKind,
    pub message: String,
}

impl PickError {
    pub fn new(kind: PickErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_source_available() -> Self {
        Self::new(
            PickErrorKind::NoSourceAvailable,
            "none of the requested sources is available and authorizable",
        )
    }

    pub fn permission_denied(kind: MediaSourceKind) -> Self {
        Self::new(
            PickErrorKind::PermissionDenied,
            format!("access to {} was refused", kind),
        )
    }

    pub fn permission_restricted(kind: MediaSourceKind) -> Self {
        Self::new(
            PickErrorKind::PermissionRestricted,
            format!("access to {} is restricted by policy", kind),
        )
    }

    pub fn capability_missing(kind: MediaSourceKind) -> Self {
        Self::new(
            PickErrorKind::DeviceCapabilityMissing,
            format!("{} is not available on this device", kind),
        )
    }

    pub fn native_capture(message: impl Into<String>) -> Self {
        Self::new(PickErrorKind::NativeCaptureError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(PickErrorKind::NotFound, message)
    }
}

impl fmt::Display for PickError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Caller bugs, reported synchronously from `pick()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// `pick()` was called while a session is still in flight
    SessionInFlight,
    /// `pick()` was called with no completion configured
    MissingCompletion,
    /// `pick()` was called outside of a tokio runtime
    NoRuntime,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::SessionInFlight => write!(f, "A pick session is already in flight"),
            UsageError::MissingCompletion => write!(f, "No completion configured"),
            UsageError::NoRuntime => write!(f, "pick() requires a running tokio runtime"),
        }
    }
}

/// Main crate error type
#[derive(Debug, Clone)]
pub enum PickerError {
    /// The API was used incorrectly
    Usage(UsageError),
    /// A pick ended in failure (surfaced by convenience wrappers)
    Pick(PickError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Platform backend errors (D-Bus, V4L2, dialogs)
    Backend(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for PickerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickerError::Usage(e) => write!(f, "Usage error: {}", e),
            PickerError::Pick(e) => write!(f, "Pick failed: {}", e),
            PickerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PickerError::Storage(msg) => write!(f, "Storage error: {}", msg),
            PickerError::Backend(msg) => write!(f, "Backend error: {}", msg),
            PickerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PickErrorKind {}
impl std::error::Error for PickError {}
impl std::error::Error for UsageError {}
impl std::error::Error for PickerError {}

impl From<UsageError> for PickerError {
    fn from(err: UsageError) -> Self {
        PickerError::Usage(err)
    }
}

impl From<PickError> for PickerError {
    fn from(err: PickError) -> Self {
        PickerError::Pick(err)
    }
}

impl From<String> for PickerError {
    fn from(msg: String) -> Self {
        PickerError::Other(msg)
    }
}

impl From<&str> for PickerError {
    fn from(msg: &str) -> Self {
        PickerError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for PickerError {
    fn from(err: std::io::Error) -> Self {
        PickerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PickerError {
    fn from(err: serde_json::Error) -> Self {
        PickerError::Config(err.to_string())
    }
}

impl From<zbus::Error> for PickerError {
    fn from(err: zbus::Error) -> Self {
        PickerError::Backend(err.to_string())
    }
}
