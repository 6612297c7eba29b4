// SPDX-License-Identifier: GPL-3.0-only

//! Broker session state machine
//!
//! One session drives one pick from start to a terminal state:
//!
//! ```text
//! Idle ─pick()─▶ RequestingAuthorization ─┬─▶ Blocked ─────────────▶ Failed
//!                                         └─▶ Choosing ─┬──────────▶ Cancelled / Failed
//!                                                       └─▶ Capturing ─┬─▶ Cancelled / Failed
//!                                                                      └─▶ Finalizing ─▶ Delivered
//! ```
//!
//! Transitions run as sequential awaits on a single tokio task, so two
//! states are never active at once. Each terminal state invokes the
//! completion exactly once and then drops the registry's reference.

pub mod registry;

use crate::authorization::{AuthorizationGate, AuthorizationState};
use crate::backends::{DeviceAccess, MediaLibrary, PresentationHost};
use crate::capture::CaptureCoordinator;
use crate::catalog::SourceCatalog;
use crate::chooser::SourceChooser;
use crate::config::PromptTiming;
use crate::errors::{PickError, UsageError};
use crate::pipelines::{OrientationNormalizer, ResultPipeline};
use crate::types::{Interruption, MediaSourceKind, PickResult, PickedMedia};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The collaborators a session works with
#[derive(Clone)]
pub struct BrokerContext {
    pub gate: AuthorizationGate,
    pub host: Arc<dyn PresentationHost>,
    pub library: Arc<dyn MediaLibrary>,
    pub normalizer: Arc<dyn OrientationNormalizer>,
}

impl BrokerContext {
    pub fn new(
        access: Arc<dyn DeviceAccess>,
        host: Arc<dyn PresentationHost>,
        library: Arc<dyn MediaLibrary>,
        normalizer: Arc<dyn OrientationNormalizer>,
    ) -> Self {
        Self {
            gate: AuthorizationGate::new(access),
            host,
            library,
            normalizer,
        }
    }
}

/// Identifier of a broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a broker session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    RequestingAuthorization,
    /// Nothing usable remains; the session is about to fail
    Blocked,
    Choosing,
    Capturing,
    Finalizing,
    Delivered,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Delivered | SessionState::Cancelled | SessionState::Failed
        )
    }

    /// Started and not yet terminal
    pub fn is_in_flight(&self) -> bool {
        *self != SessionState::Idle && !self.is_terminal()
    }
}

/// One pick invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickRequest {
    /// Candidate sources; order is presentation order and priority
    pub inputs: Vec<MediaSourceKind>,
    pub permission_message: String,
    pub normalize_image: bool,
    pub prompt_timing: PromptTiming,
}

/// Single-use completion for one session run
pub type Completion = Box<dyn FnOnce(PickResult) + Send + 'static>;

/// The pick orchestrator
///
/// A session runs at most one pick at a time. Once a run reaches a terminal
/// state the session may be picked again.
pub struct BrokerSession {
    id: SessionId,
    context: BrokerContext,
    state: Mutex<SessionState>,
    history: Mutex<Vec<SessionState>>,
    completion: Mutex<Option<Completion>>,
}

impl BrokerSession {
    pub fn new(context: BrokerContext) -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::new(),
            context,
            state: Mutex::new(SessionState::Idle),
            history: Mutex::new(Vec::new()),
            completion: Mutex::new(None),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn context(&self) -> &BrokerContext {
        &self.context
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn is_in_flight(&self) -> bool {
        self.state().is_in_flight()
    }

    /// States entered during the current (or last) run, in order
    pub fn history(&self) -> Vec<SessionState> {
        lock(&self.history).clone()
    }

    /// Start a pick
    ///
    /// Returns immediately. The run continues on the current tokio runtime
    /// and ends by calling `completion` exactly once. The registry keeps the
    /// session alive until then, whether or not the caller holds it.
    pub fn pick(self: &Arc<Self>, request: PickRequest, completion: Completion) -> Result<SessionId, UsageError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| UsageError::NoRuntime)?;

        {
            let mut state = lock(&self.state);
            if state.is_in_flight() {
                warn!(session = %self.id, state = ?*state, "pick() called while a session is in flight");
                return Err(UsageError::SessionInFlight);
            }
            *state = SessionState::RequestingAuthorization;
            *lock(&self.history) = vec![SessionState::RequestingAuthorization];
        }
        *lock(&self.completion) = Some(completion);
        registry::retain(Arc::clone(self));

        info!(
            session = %self.id,
            inputs = ?request.inputs,
            normalize = request.normalize_image,
            timing = ?request.prompt_timing,
            "Pick started"
        );

        let id = self.id;
        runtime.spawn(async move {
            let Some(session) = registry::lookup(id) else {
                error!(session = %id, "Session missing from the registry");
                return;
            };
            session.run(request).await;
        });

        Ok(id)
    }

    async fn run(&self, request: PickRequest) {
        let result = match self.drive(&request).await {
            Ok(media) => PickResult::Success(media),
            Err(interruption) => interruption.into(),
        };
        self.deliver(result);
    }

    async fn drive(&self, request: &PickRequest) -> Result<PickedMedia, Interruption> {
        let context = &self.context;

        let usable = self.resolve_sources(request).await?;

        self.transition(SessionState::Choosing);
        let source = SourceChooser::new(Arc::clone(&context.host))
            .choose(&usable)
            .await?;

        self.transition(SessionState::Capturing);
        let raw = CaptureCoordinator::new(
            context.gate.clone(),
            Arc::clone(&context.host),
            Arc::clone(&context.library),
        )
        .capture(source, &request.permission_message)
        .await?;

        self.transition(SessionState::Finalizing);
        let media = ResultPipeline::new(Arc::clone(&context.normalizer))
            .finalize(source, raw, request.normalize_image)
            .await?;

        Ok(media)
    }

    /// The `RequestingAuthorization` step
    ///
    /// With upfront prompts every undetermined kind is asked for once,
    /// before the usable set is computed. Otherwise prompting waits until a
    /// source has been picked.
    async fn resolve_sources(&self, request: &PickRequest) -> Result<Vec<MediaSourceKind>, Interruption> {
        let gate = &self.context.gate;
        let mut refused = None;

        if request.prompt_timing == PromptTiming::Upfront {
            let mut asked: Vec<MediaSourceKind> = Vec::new();
            for &kind in &request.inputs {
                if asked.contains(&kind) || gate.current_state(kind) != AuthorizationState::NotDetermined {
                    continue;
                }
                asked.push(kind);
                let state = gate.request(kind, &request.permission_message).await;
                if state == AuthorizationState::Denied {
                    refused.get_or_insert(kind);
                }
            }
        }

        let resolution = SourceCatalog::new(gate).resolve(&request.inputs);
        if !resolution.is_empty() {
            return Ok(resolution.usable);
        }

        self.transition(SessionState::Blocked);
        debug!(session = %self.id, blocked = ?resolution.blocked, "No usable sources");
        match refused {
            Some(kind) => {
                self.context
                    .host
                    .present_settings_redirect(kind, &request.permission_message)
                    .await;
                Err(PickError::permission_denied(kind).into())
            }
            None => Err(PickError::no_source_available().into()),
        }
    }

    fn deliver(&self, result: PickResult) {
        let terminal = match &result {
            PickResult::Success(_) => SessionState::Delivered,
            PickResult::Cancelled => SessionState::Cancelled,
            PickResult::Failed(_) => SessionState::Failed,
        };

        // Release before leaving the in-flight states so a pick() issued
        // from inside the completion registers cleanly.
        let completion = lock(&self.completion).take();
        registry::release(self.id);
        self.transition(terminal);

        match completion {
            Some(completion) => {
                match result.error() {
                    Some(err) => info!(session = %self.id, outcome = ?terminal, error = %err, "Delivering result"),
                    None => info!(session = %self.id, outcome = ?terminal, "Delivering result"),
                }
                completion(result);
            }
            None => error!(session = %self.id, "Completion already consumed"),
        }
    }

    fn transition(&self, to: SessionState) {
        let from = std::mem::replace(&mut *lock(&self.state), to);
        lock(&self.history).push(to);
        debug!(session = %self.id, from = ?from, to = ?to, "Session transition");
    }
}

impl fmt::Debug for BrokerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::ConsentStatus;
    use crate::backends::scripted::{ScriptedAccess, ScriptedHost, ScriptedLibrary, sample_png};
    use crate::backends::{CaptureOutcome, ChooserOutcome};
    use crate::errors::PickErrorKind;
    use crate::pipelines::ImageNormalizer;
    use crate::types::Orientation;
    use MediaSourceKind::*;
    use tokio::sync::mpsc;

    fn context(access: &Arc<ScriptedAccess>, host: &Arc<ScriptedHost>) -> BrokerContext {
        BrokerContext::new(
            access.clone(),
            host.clone(),
            Arc::new(ScriptedLibrary::with_latest(sample_png(2, 2, Orientation::Up))),
            Arc::new(ImageNormalizer::default()),
        )
    }

    fn request(inputs: &[MediaSourceKind], timing: PromptTiming) -> PickRequest {
        PickRequest {
            inputs: inputs.to_vec(),
            permission_message: "Let me see your photos".to_string(),
            normalize_image: false,
            prompt_timing: timing,
        }
    }

    fn channel_completion() -> (Completion, mpsc::UnboundedReceiver<PickResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let completion: Completion = Box::new(move |result| {
            let _ = tx.send(result);
        });
        (completion, rx)
    }

    #[test]
    fn test_pick_outside_runtime_is_usage_error() {
        let access = Arc::new(ScriptedAccess::new());
        let host = Arc::new(ScriptedHost::new());
        let session = BrokerSession::new(context(&access, &host));
        let (completion, _rx) = channel_completion();

        let err = session
            .pick(request(&[PhotoLibrary], PromptTiming::OnSelection), completion)
            .unwrap_err();
        assert_eq!(err, UsageError::NoRuntime);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_success_walks_every_state() {
        let access = Arc::new(ScriptedAccess::new().with_consent(PhotoLibrary, ConsentStatus::Granted));
        let host = Arc::new(
            ScriptedHost::new().capture(PhotoLibrary, CaptureOutcome::Captured(sample_png(1, 1, Orientation::Up))),
        );
        let session = BrokerSession::new(context(&access, &host));
        let (completion, mut rx) = channel_completion();

        let id = session
            .pick(request(&[PhotoLibrary], PromptTiming::OnSelection), completion)
            .unwrap();

        let result = rx.recv().await.unwrap();
        assert!(result.is_success());
        assert_eq!(
            session.history(),
            vec![
                SessionState::RequestingAuthorization,
                SessionState::Choosing,
                SessionState::Capturing,
                SessionState::Finalizing,
                SessionState::Delivered,
            ]
        );
        assert!(!registry::is_in_flight(id));
        assert!(rx.recv().await.is_none(), "completion must fire exactly once");
    }

    #[tokio::test]
    async fn test_empty_inputs_blocked_without_chooser() {
        let access = Arc::new(ScriptedAccess::new());
        let host = Arc::new(ScriptedHost::new());
        let session = BrokerSession::new(context(&access, &host));
        let (completion, mut rx) = channel_completion();

        session.pick(request(&[], PromptTiming::OnSelection), completion).unwrap();

        let result = rx.recv().await.unwrap();
        assert_eq!(result.error().map(|e| e.kind), Some(PickErrorKind::NoSourceAvailable));
        assert_eq!(
            session.history(),
            vec![
                SessionState::RequestingAuthorization,
                SessionState::Blocked,
                SessionState::Failed,
            ]
        );
        assert!(host.events().is_empty());
    }

    #[tokio::test]
    async fn test_reentrant_pick_rejected_while_in_flight() {
        let access = Arc::new(ScriptedAccess::new().hold_prompts());
        let host = Arc::new(
            ScriptedHost::new().capture(LiveCamera, CaptureOutcome::Captured(sample_png(1, 1, Orientation::Up))),
        );
        let session = BrokerSession::new(context(&access, &host));
        let (first, mut rx) = channel_completion();
        let (second, _unused) = channel_completion();

        session
            .pick(request(&[LiveCamera], PromptTiming::OnSelection), first)
            .unwrap();
        // Wait until the session is parked on the consent prompt
        while access.prompts().is_empty() {
            tokio::task::yield_now().await;
        }

        let err = session
            .pick(request(&[LiveCamera], PromptTiming::OnSelection), second)
            .unwrap_err();
        assert_eq!(err, UsageError::SessionInFlight);

        access.release_prompts();
        assert!(rx.recv().await.unwrap().is_success());
        assert_eq!(host.capture_presentations(), 1);
    }

    #[tokio::test]
    async fn test_session_survives_without_caller_reference() {
        let access = Arc::new(ScriptedAccess::new().hold_prompts());
        let host = Arc::new(ScriptedHost::new().capture(LiveCamera, CaptureOutcome::Dismissed));
        let session = BrokerSession::new(context(&access, &host));
        let (completion, mut rx) = channel_completion();

        let id = session
            .pick(request(&[LiveCamera], PromptTiming::OnSelection), completion)
            .unwrap();
        drop(session);
        assert!(registry::is_in_flight(id));

        access.release_prompts();
        assert!(rx.recv().await.unwrap().is_cancelled());
        assert!(!registry::is_in_flight(id));
    }

    #[tokio::test]
    async fn test_pick_again_after_terminal() {
        let access = Arc::new(ScriptedAccess::new().with_consent(LastCapturedPhoto, ConsentStatus::Granted));
        let host = Arc::new(ScriptedHost::new());
        let session = BrokerSession::new(context(&access, &host));

        for _ in 0..2 {
            let (completion, mut rx) = channel_completion();
            session
                .pick(request(&[LastCapturedPhoto], PromptTiming::OnSelection), completion)
                .unwrap();
            assert!(rx.recv().await.unwrap().is_success());
        }
        assert_eq!(session.state(), SessionState::Delivered);
    }

    #[tokio::test]
    async fn test_upfront_prompts_every_undetermined_kind_once() {
        let access = Arc::new(ScriptedAccess::new());
        let host = Arc::new(ScriptedHost::new().choose(ChooserOutcome::Cancelled));
        let session = BrokerSession::new(context(&access, &host));
        let (completion, mut rx) = channel_completion();

        session
            .pick(
                request(&[PhotoLibrary, LiveCamera, PhotoLibrary], PromptTiming::Upfront),
                completion,
            )
            .unwrap();

        assert!(rx.recv().await.unwrap().is_cancelled());
        assert_eq!(access.prompts(), vec![PhotoLibrary, LiveCamera]);
        assert_eq!(host.chooser_presentations(), 1);
    }

    #[tokio::test]
    async fn test_upfront_refusal_of_everything_is_permission_denied() {
        let access = Arc::new(ScriptedAccess::new().answer(LiveCamera, ConsentStatus::Denied));
        let host = Arc::new(ScriptedHost::new());
        let session = BrokerSession::new(context(&access, &host));
        let (completion, mut rx) = channel_completion();

        session
            .pick(request(&[LiveCamera], PromptTiming::Upfront), completion)
            .unwrap();

        let result = rx.recv().await.unwrap();
        assert_eq!(result.error().map(|e| e.kind), Some(PickErrorKind::PermissionDenied));
        assert_eq!(host.settings_redirects(), 1);
        assert_eq!(host.capture_presentations(), 0);
    }

    #[test]
    fn test_state_classification() {
        assert!(!SessionState::Idle.is_in_flight());
        assert!(SessionState::Capturing.is_in_flight());
        assert!(SessionState::Blocked.is_in_flight());
        assert!(SessionState::Cancelled.is_terminal());
        assert!(!SessionState::Cancelled.is_in_flight());
    }
}
