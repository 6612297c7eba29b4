// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for device access and presentation
//!
//! The broker core never talks to the operating system or draws UI itself.
//! Everything it needs from the outside world goes through the traits in
//! this module:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Broker core                   │
//! │  gate · catalog · chooser · capture · session│
//! └────────┬──────────────┬──────────────┬──────┘
//!          │              │              │
//! ┌────────┴─────┐ ┌──────┴───────┐ ┌────┴─────────┐
//! │ DeviceAccess │ │ Presentation │ │ MediaLibrary │
//! │ (consent)    │ │ Host (UI)    │ │ (last photo) │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`desktop`]: Linux desktop implementation of [`DeviceAccess`]
//! - [`library`]: Pictures-directory implementation of [`MediaLibrary`]
//! - [`portal`]: XDG desktop portal camera consent over D-Bus
//! - [`terminal`]: Terminal implementation of [`PresentationHost`]
//! - [`v4l2`]: Single-frame camera capture
//! - [`scripted`]: Deterministic in-memory backends for tests and embedding

pub mod desktop;
pub mod library;
pub mod portal;
pub mod scripted;
pub mod terminal;
pub mod v4l2;

use crate::authorization::ConsentStatus;
use crate::types::{CapturedMedia, MediaSourceKind};
use futures::future::BoxFuture;

/// Process-wide device capability and consent state
///
/// Implementations are the only place that knows how the platform grants
/// access to cameras and photo storage.
pub trait DeviceAccess: Send + Sync {
    /// Whether the hardware or service behind `kind` exists
    fn is_capable(&self, kind: MediaSourceKind) -> bool;

    /// Current consent status for `kind`, without prompting
    fn consent(&self, kind: MediaSourceKind) -> ConsentStatus;

    /// Show the platform consent prompt for `kind` and resolve with the
    /// user's answer
    ///
    /// The returned future owns everything it needs so that concurrent
    /// callers can share it.
    fn prompt_consent(&self, kind: MediaSourceKind, message: &str) -> BoxFuture<'static, ConsentStatus>;

    /// Identity of the consent store answering for `kind`
    ///
    /// Prompts are deduplicated per scope, so backends whose answers live in
    /// process-wide state must report the same scope from every instance.
    /// Defaults to the address of this backend.
    fn consent_scope(&self, _kind: MediaSourceKind) -> usize {
        self as *const Self as *const () as usize
    }
}

/// Result of presenting the source chooser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChooserOutcome {
    Chosen(MediaSourceKind),
    Cancelled,
}

/// Result of presenting a capture or library UI
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured(CapturedMedia),
    /// The user dismissed the UI
    Dismissed,
    /// The UI reported a failure
    Failed(String),
}

/// The UI collaborator
///
/// Hosts that own a UI thread are responsible for marshalling onto it; the
/// broker awaits these futures from its session task.
pub trait PresentationHost: Send + Sync {
    /// Let the user pick one of `options` (in order) or cancel
    fn present_chooser<'a>(&'a self, options: &'a [MediaSourceKind]) -> BoxFuture<'a, ChooserOutcome>;

    /// Explain that access to `kind` was refused and offer to open the
    /// system settings
    fn present_settings_redirect<'a>(&'a self, kind: MediaSourceKind, message: &'a str) -> BoxFuture<'a, ()>;

    /// Run the capture or library UI for `kind`
    fn present_capture(&self, kind: MediaSourceKind) -> BoxFuture<'_, CaptureOutcome>;
}

/// Read access to the user's photo library
pub trait MediaLibrary: Send + Sync {
    /// The most recent asset, or `None` if the library is empty or unreadable
    fn latest_asset(&self) -> BoxFuture<'_, Option<CapturedMedia>>;
}
