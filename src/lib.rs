// SPDX-License-Identifier: GPL-3.0-only

//! Media Broker - media acquisition for applications
//!
//! This library lets an application ask for "a photo" without caring where
//! it comes from. It resolves which sources the device offers and the user
//! has allowed, lets the user pick one, captures from it and delivers
//! exactly one result.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`picker`]: Caller-facing configuration and entry points
//! - [`session`]: Pick state machine and in-flight registry
//! - [`authorization`]: Capability + consent classification and prompting
//! - [`catalog`]: Usable source resolution
//! - [`chooser`]: Source selection
//! - [`capture`]: Per-source authorization and capture
//! - [`pipelines`]: Post-capture result pipeline
//! - [`backends`]: Platform and UI seams, with desktop and scripted implementations
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let config = PickerConfig::load()?;
//! let picker = MediaPicker::desktop(&config)
//!     .with_completion(|result| println!("{:?}", result.is_success()));
//! picker.pick()?;
//! ```

pub mod authorization;
pub mod backends;
pub mod capture;
pub mod catalog;
pub mod chooser;
pub mod config;
pub mod constants;
pub mod errors;
pub mod picker;
pub mod pipelines;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use authorization::{AuthorizationGate, AuthorizationState, ConsentStatus};
pub use config::{PickerConfig, PromptTiming};
pub use errors::{PickError, PickErrorKind, PickerError, PickerResult, UsageError};
pub use picker::{
    MediaPicker, in_flight_sessions, is_authorized_for_access_for_action, source_available_for_input,
};
pub use session::{BrokerContext, SessionId, SessionState};
pub use types::{CapturedMedia, MediaAsset, MediaSourceKind, Orientation, PickResult, PickedMedia};
