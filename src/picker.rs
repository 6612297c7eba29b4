// SPDX-License-Identifier: GPL-3.0-only

//! Caller-facing picker
//!
//! A [`MediaPicker`] holds the caller's configuration and owns one
//! [`BrokerSession`]. Each `pick()` starts a run of that session; the
//! completion fires once per run.

use crate::authorization::{AuthorizationGate, AuthorizationState};
use crate::backends::desktop::{desktop_context, platform_gate};
use crate::capture::CaptureCoordinator;
use crate::config::{PickerConfig, PromptTiming};
use crate::constants::DEFAULT_PERMISSION_MESSAGE;
use crate::errors::{PickError, UsageError};
use crate::session::{BrokerContext, BrokerSession, PickRequest, SessionId, SessionState, registry};
use crate::types::{CapturedMedia, MediaSourceKind, PickResult};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type SharedCompletion = Arc<dyn Fn(PickResult) + Send + Sync + 'static>;

pub struct MediaPicker {
    session: Arc<BrokerSession>,
    inputs: Vec<MediaSourceKind>,
    permission_message: String,
    normalize_image: bool,
    prompt_timing: PromptTiming,
    completion: Option<SharedCompletion>,
}

impl MediaPicker {
    pub fn new(context: BrokerContext) -> Self {
        Self {
            session: BrokerSession::new(context),
            inputs: Vec::new(),
            permission_message: DEFAULT_PERMISSION_MESSAGE.to_string(),
            normalize_image: false,
            prompt_timing: PromptTiming::default(),
            completion: None,
        }
    }

    /// Picker with settings taken from `config`
    pub fn from_config(context: BrokerContext, config: &PickerConfig) -> Self {
        Self::new(context)
            .with_inputs(config.inputs.clone())
            .with_permission_message(config.permission_message.clone())
            .with_normalize_image(config.normalize_image)
            .with_prompt_timing(config.prompt_timing)
    }

    /// Picker over the desktop backends and terminal host
    pub fn desktop(config: &PickerConfig) -> Self {
        Self::from_config(desktop_context(config), config)
    }

    pub fn with_inputs(mut self, inputs: impl Into<Vec<MediaSourceKind>>) -> Self {
        self.inputs = inputs.into();
        self
    }

    pub fn with_permission_message(mut self, message: impl Into<String>) -> Self {
        self.permission_message = message.into();
        self
    }

    pub fn with_normalize_image(mut self, normalize: bool) -> Self {
        self.normalize_image = normalize;
        self
    }

    pub fn with_prompt_timing(mut self, timing: PromptTiming) -> Self {
        self.prompt_timing = timing;
        self
    }

    pub fn with_completion<F>(mut self, completion: F) -> Self
    where
        F: Fn(PickResult) + Send + Sync + 'static,
    {
        self.completion = Some(Arc::new(completion));
        self
    }

    pub fn set_inputs(&mut self, inputs: impl Into<Vec<MediaSourceKind>>) {
        self.inputs = inputs.into();
    }

    pub fn set_permission_message(&mut self, message: impl Into<String>) {
        self.permission_message = message.into();
    }

    pub fn set_normalize_image(&mut self, normalize: bool) {
        self.normalize_image = normalize;
    }

    pub fn set_prompt_timing(&mut self, timing: PromptTiming) {
        self.prompt_timing = timing;
    }

    pub fn set_completion<F>(&mut self, completion: F)
    where
        F: Fn(PickResult) + Send + Sync + 'static,
    {
        self.completion = Some(Arc::new(completion));
    }

    pub fn inputs(&self) -> &[MediaSourceKind] {
        &self.inputs
    }

    pub fn permission_message(&self) -> &str {
        &self.permission_message
    }

    pub fn normalize_image(&self) -> bool {
        self.normalize_image
    }

    pub fn prompt_timing(&self) -> PromptTiming {
        self.prompt_timing
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// The gate this picker's sessions authorize through
    pub fn gate(&self) -> &AuthorizationGate {
        &self.session.context().gate
    }

    fn request(&self) -> PickRequest {
        PickRequest {
            inputs: self.inputs.clone(),
            permission_message: self.permission_message.clone(),
            normalize_image: self.normalize_image,
            prompt_timing: self.prompt_timing,
        }
    }

    /// Start a pick with the configured completion
    pub fn pick(&self) -> Result<SessionId, UsageError> {
        let Some(completion) = self.completion.clone() else {
            warn!(session = %self.session.id(), "pick() without a completion");
            return Err(UsageError::MissingCompletion);
        };
        self.session
            .pick(self.request(), Box::new(move |result| completion(result)))
    }

    /// Start a pick with a one-off completion instead of the configured one
    pub fn pick_with<F>(&self, completion: F) -> Result<SessionId, UsageError>
    where
        F: FnOnce(PickResult) + Send + 'static,
    {
        self.session.pick(self.request(), Box::new(completion))
    }

    /// Pick and wait for the result
    pub async fn pick_async(&self) -> Result<PickResult, UsageError> {
        let (tx, rx) = oneshot::channel();
        self.pick_with(move |result| {
            let _ = tx.send(result);
        })?;
        // The session always completes, so the sender is never dropped unused
        Ok(rx.await.unwrap_or(PickResult::Cancelled))
    }

    /// Request every undetermined input without any picker UI
    ///
    /// `callback` receives `true` iff there is at least one input and every
    /// input is authorized afterwards.
    pub fn request_access<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("request_access() outside a tokio runtime");
            callback(false);
            return;
        };

        let gate = self.gate().clone();
        let inputs = self.inputs.clone();
        let message = self.permission_message.clone();
        runtime.spawn(async move {
            callback(request_all(&gate, &inputs, &message).await);
        });
    }

    /// Async form of [`request_access`](Self::request_access)
    pub async fn access(&self) -> bool {
        request_all(self.gate(), &self.inputs, &self.permission_message).await
    }

    /// Fetch the newest library photo without UI or prompts
    pub fn get_last_captured_photo<F>(&self, callback: F)
    where
        F: FnOnce(Result<CapturedMedia, PickError>) + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("get_last_captured_photo() outside a tokio runtime");
            callback(Err(PickError::not_found("no runtime to read the photo library on")));
            return;
        };

        let coordinator = self.coordinator();
        runtime.spawn(async move {
            callback(coordinator.last_captured_photo().await);
        });
    }

    /// Async form of [`get_last_captured_photo`](Self::get_last_captured_photo)
    pub async fn last_captured_photo(&self) -> Result<CapturedMedia, PickError> {
        self.coordinator().last_captured_photo().await
    }

    fn coordinator(&self) -> CaptureCoordinator {
        let context = self.session.context();
        CaptureCoordinator::new(
            context.gate.clone(),
            Arc::clone(&context.host),
            Arc::clone(&context.library),
        )
    }
}

async fn request_all(gate: &AuthorizationGate, inputs: &[MediaSourceKind], message: &str) -> bool {
    if inputs.is_empty() {
        return false;
    }

    let mut all_authorized = true;
    let mut asked: Vec<MediaSourceKind> = Vec::new();
    for &kind in inputs {
        if asked.contains(&kind) {
            continue;
        }
        asked.push(kind);
        let state = gate.request(kind, message).await;
        debug!(kind = %kind, state = ?state, "Access request resolved");
        all_authorized &= state == AuthorizationState::Authorized;
    }
    all_authorized
}

/// Whether the platform has the capability behind `kind`
pub fn source_available_for_input(kind: MediaSourceKind) -> bool {
    platform_gate().source_available(kind)
}

/// Whether `kind` is authorized on the platform right now
pub fn is_authorized_for_access_for_action(kind: MediaSourceKind) -> bool {
    platform_gate().is_authorized(kind)
}

/// Sessions currently started and not yet delivered, process-wide
pub fn in_flight_sessions() -> usize {
    registry::in_flight_count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::ConsentStatus;
    use crate::backends::scripted::{ScriptedAccess, ScriptedHost, ScriptedLibrary, sample_png};
    use crate::pipelines::ImageNormalizer;
    use crate::types::Orientation;
    use MediaSourceKind::*;

    fn picker(access: &Arc<ScriptedAccess>) -> MediaPicker {
        MediaPicker::new(BrokerContext::new(
            access.clone(),
            Arc::new(ScriptedHost::new()),
            Arc::new(ScriptedLibrary::with_latest(sample_png(1, 1, Orientation::Up))),
            Arc::new(ImageNormalizer::default()),
        ))
    }

    #[tokio::test]
    async fn test_pick_without_completion_is_usage_error() {
        let picker = picker(&Arc::new(ScriptedAccess::new())).with_inputs([PhotoLibrary]);
        assert_eq!(picker.pick(), Err(UsageError::MissingCompletion));
        assert_eq!(picker.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_from_config_copies_settings() {
        let config = PickerConfig {
            inputs: vec![LiveCamera],
            normalize_image: true,
            prompt_timing: PromptTiming::Upfront,
            ..PickerConfig::default()
        };
        let picker = MediaPicker::from_config(
            picker(&Arc::new(ScriptedAccess::new())).session.context().clone(),
            &config,
        );
        assert_eq!(picker.inputs(), &[LiveCamera]);
        assert!(picker.normalize_image());
        assert_eq!(picker.prompt_timing(), PromptTiming::Upfront);
        assert_eq!(picker.permission_message(), config.permission_message);
    }

    #[tokio::test]
    async fn test_access_with_no_inputs_is_false() {
        let access = Arc::new(ScriptedAccess::new());
        assert!(!picker(&access).access().await);
        assert!(access.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_access_prompts_each_kind_once() {
        let access = Arc::new(ScriptedAccess::new().with_consent(LastCapturedPhoto, ConsentStatus::Granted));
        let picker = picker(&access).with_inputs([LiveCamera, LastCapturedPhoto, LiveCamera]);

        assert!(picker.access().await);
        assert_eq!(access.prompts(), vec![LiveCamera]);
    }

    #[tokio::test]
    async fn test_access_false_when_any_input_refused() {
        let access = Arc::new(ScriptedAccess::new().answer(LiveCamera, ConsentStatus::Denied));
        let picker = picker(&access).with_inputs([PhotoLibrary, LiveCamera]);

        let (tx, rx) = oneshot::channel();
        picker.request_access(move |granted| {
            let _ = tx.send(granted);
        });
        assert!(!rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_get_last_captured_photo_callback() {
        let access = Arc::new(ScriptedAccess::new().with_consent(LastCapturedPhoto, ConsentStatus::Granted));
        let picker = picker(&access);

        let (tx, rx) = oneshot::channel();
        picker.get_last_captured_photo(move |result| {
            let _ = tx.send(result);
        });
        let media = rx.await.unwrap().unwrap();
        assert_eq!(media.asset.content_type, "image/png");
    }
}
