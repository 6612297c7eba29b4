// SPDX-License-Identifier: GPL-3.0-only

//! Capture coordination for a single resolved source
//!
//! Makes sure the chosen source is authorized (prompting if it is still
//! undetermined), then obtains the raw media: straight from the library for
//! the last captured photo, through the host capture UI otherwise.

use crate::authorization::{AuthorizationGate, AuthorizationState};
use crate::backends::{CaptureOutcome, MediaLibrary, PresentationHost};
use crate::errors::PickError;
use crate::types::{CapturedMedia, Interruption, MediaSourceKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CaptureCoordinator {
    gate: AuthorizationGate,
    host: Arc<dyn PresentationHost>,
    library: Arc<dyn MediaLibrary>,
}

impl CaptureCoordinator {
    pub fn new(gate: AuthorizationGate, host: Arc<dyn PresentationHost>, library: Arc<dyn MediaLibrary>) -> Self {
        Self { gate, host, library }
    }

    /// Authorize `kind` and obtain raw media from it
    pub async fn capture(&self, kind: MediaSourceKind, permission_message: &str) -> Result<CapturedMedia, Interruption> {
        self.authorize(kind, permission_message).await?;

        match kind {
            MediaSourceKind::LastCapturedPhoto => {
                let media = self
                    .library
                    .latest_asset()
                    .await
                    .ok_or_else(|| PickError::not_found("the photo library has no photos"))?;
                debug!(bytes = media.asset.len(), "Fetched last captured photo");
                Ok(media)
            }
            MediaSourceKind::PhotoLibrary | MediaSourceKind::LiveCamera => {
                info!(kind = %kind, "Presenting capture UI");
                match self.host.present_capture(kind).await {
                    CaptureOutcome::Captured(media) => {
                        debug!(kind = %kind, bytes = media.asset.len(), "Capture UI returned media");
                        Ok(media)
                    }
                    CaptureOutcome::Dismissed => {
                        info!(kind = %kind, "Capture UI dismissed");
                        Err(Interruption::Cancelled)
                    }
                    CaptureOutcome::Failed(message) => {
                        warn!(kind = %kind, error = %message, "Capture UI failed");
                        Err(PickError::native_capture(message).into())
                    }
                }
            }
        }
    }

    /// Ensure `kind` is authorized, prompting if undetermined
    ///
    /// A user refusal offers the settings redirect before failing. A policy
    /// restriction fails without it, since settings cannot fix it. A prompt
    /// dismissed without an answer counts as a cancellation.
    pub async fn authorize(&self, kind: MediaSourceKind, permission_message: &str) -> Result<(), Interruption> {
        let state = match self.gate.current_state(kind) {
            AuthorizationState::NotDetermined => self.gate.request(kind, permission_message).await,
            state => state,
        };

        match state {
            AuthorizationState::Authorized => Ok(()),
            AuthorizationState::Denied => {
                info!(kind = %kind, "Access refused, offering settings redirect");
                self.host.present_settings_redirect(kind, permission_message).await;
                Err(PickError::permission_denied(kind).into())
            }
            AuthorizationState::Restricted => Err(PickError::permission_restricted(kind).into()),
            AuthorizationState::Unavailable => Err(PickError::capability_missing(kind).into()),
            AuthorizationState::NotDetermined => {
                info!(kind = %kind, "Consent prompt dismissed without an answer");
                Err(Interruption::Cancelled)
            }
        }
    }

    /// Fetch the newest library asset without any UI or prompt
    ///
    /// Fails with `NotFound` when the library is empty or not accessible.
    pub async fn last_captured_photo(&self) -> Result<CapturedMedia, PickError> {
        let kind = MediaSourceKind::LastCapturedPhoto;
        if !self.gate.is_authorized(kind) {
            debug!(state = ?self.gate.current_state(kind), "Photo library not accessible");
            return Err(PickError::not_found("the photo library is not accessible"));
        }

        self.library
            .latest_asset()
            .await
            .ok_or_else(|| PickError::not_found("the photo library has no photos"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::ConsentStatus;
    use crate::backends::scripted::{HostEvent, ScriptedAccess, ScriptedHost, ScriptedLibrary, sample_png};
    use crate::errors::PickErrorKind;
    use crate::types::Orientation;
    use MediaSourceKind::*;

    fn coordinator(access: ScriptedAccess, host: &Arc<ScriptedHost>, library: ScriptedLibrary) -> CaptureCoordinator {
        CaptureCoordinator::new(
            AuthorizationGate::new(Arc::new(access)),
            host.clone(),
            Arc::new(library),
        )
    }

    fn failed_kind<T: std::fmt::Debug>(result: Result<T, Interruption>) -> PickErrorKind {
        match result {
            Err(Interruption::Failed(err)) => err.kind,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authorized_capture_shows_no_prompt() {
        let media = sample_png(2, 2, Orientation::Up);
        let host = Arc::new(ScriptedHost::new().capture(PhotoLibrary, CaptureOutcome::Captured(media.clone())));
        let access = ScriptedAccess::new().with_consent(PhotoLibrary, ConsentStatus::Granted);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        assert_eq!(coordinator.capture(PhotoLibrary, "msg").await, Ok(media));
        assert_eq!(host.events(), vec![HostEvent::Capture(PhotoLibrary)]);
    }

    #[tokio::test]
    async fn test_denied_prompt_offers_settings_once() {
        let host = Arc::new(ScriptedHost::new());
        let access = ScriptedAccess::new().answer(LiveCamera, ConsentStatus::Denied);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        let kind = failed_kind(coordinator.capture(LiveCamera, "msg").await);
        assert_eq!(kind, PickErrorKind::PermissionDenied);
        assert_eq!(host.events(), vec![HostEvent::SettingsRedirect(LiveCamera)]);
    }

    #[tokio::test]
    async fn test_restricted_prompt_has_no_settings_redirect() {
        let host = Arc::new(ScriptedHost::new());
        let access = ScriptedAccess::new().answer(LiveCamera, ConsentStatus::Restricted);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        let kind = failed_kind(coordinator.capture(LiveCamera, "msg").await);
        assert_eq!(kind, PickErrorKind::PermissionRestricted);
        assert_eq!(host.settings_redirects(), 0);
    }

    #[tokio::test]
    async fn test_lost_capability_fails() {
        let host = Arc::new(ScriptedHost::new());
        let access = ScriptedAccess::new().unavailable(LiveCamera);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        let kind = failed_kind(coordinator.capture(LiveCamera, "msg").await);
        assert_eq!(kind, PickErrorKind::DeviceCapabilityMissing);
        assert_eq!(host.capture_presentations(), 0);
    }

    #[tokio::test]
    async fn test_dismissal_is_cancel() {
        let host = Arc::new(ScriptedHost::new().capture(LiveCamera, CaptureOutcome::Dismissed));
        let access = ScriptedAccess::new().with_consent(LiveCamera, ConsentStatus::Granted);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        assert_eq!(coordinator.capture(LiveCamera, "msg").await, Err(Interruption::Cancelled));
    }

    #[tokio::test]
    async fn test_native_failure_is_failed() {
        let host = Arc::new(
            ScriptedHost::new().capture(LiveCamera, CaptureOutcome::Failed("device busy".to_string())),
        );
        let access = ScriptedAccess::new().with_consent(LiveCamera, ConsentStatus::Granted);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        let kind = failed_kind(coordinator.capture(LiveCamera, "msg").await);
        assert_eq!(kind, PickErrorKind::NativeCaptureError);
    }

    #[tokio::test]
    async fn test_last_photo_source_skips_capture_ui() {
        let media = sample_png(1, 1, Orientation::Up);
        let host = Arc::new(ScriptedHost::new());
        let access = ScriptedAccess::new().with_consent(LastCapturedPhoto, ConsentStatus::Granted);
        let coordinator = coordinator(access, &host, ScriptedLibrary::with_latest(media.clone()));

        assert_eq!(coordinator.capture(LastCapturedPhoto, "msg").await, Ok(media));
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn test_last_captured_photo_empty_library_not_found() {
        let host = Arc::new(ScriptedHost::new());
        let access = ScriptedAccess::new().with_consent(LastCapturedPhoto, ConsentStatus::Granted);
        let coordinator = coordinator(access, &host, ScriptedLibrary::empty());

        let err = coordinator.last_captured_photo().await.unwrap_err();
        assert_eq!(err.kind, PickErrorKind::NotFound);
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn test_last_captured_photo_never_prompts() {
        let host = Arc::new(ScriptedHost::new());
        let access = Arc::new(ScriptedAccess::new());
        let coordinator = CaptureCoordinator::new(
            AuthorizationGate::new(access.clone()),
            host,
            Arc::new(ScriptedLibrary::with_latest(sample_png(1, 1, Orientation::Up))),
        );

        let err = coordinator.last_captured_photo().await.unwrap_err();
        assert_eq!(err.kind, PickErrorKind::NotFound);
        assert!(access.prompts().is_empty());
    }
}
