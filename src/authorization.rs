// SPDX-License-Identifier: GPL-3.0-only

//! Authorization gate
//!
//! Classifies each source kind by combining device capability with consent,
//! and requests consent when it has not been determined yet. Concurrent
//! requests for the same kind join a single in-flight prompt, across every
//! gate whose backend reports the same consent scope.

use crate::backends::DeviceAccess;
use crate::types::MediaSourceKind;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Raw consent classification reported by a [`DeviceAccess`] backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsentStatus {
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    Granted,
    /// The user refused
    Denied,
    /// Policy forbids access regardless of the user
    Restricted,
}

/// Combined capability + consent state of a source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationState {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
    /// The device lacks the capability; consent is irrelevant
    Unavailable,
}

impl AuthorizationState {
    /// Capability is checked first; consent only matters once it is confirmed
    pub fn classify(capable: bool, consent: ConsentStatus) -> Self {
        if !capable {
            return AuthorizationState::Unavailable;
        }
        match consent {
            ConsentStatus::NotDetermined => AuthorizationState::NotDetermined,
            ConsentStatus::Granted => AuthorizationState::Authorized,
            ConsentStatus::Denied => AuthorizationState::Denied,
            ConsentStatus::Restricted => AuthorizationState::Restricted,
        }
    }

    pub fn is_usable(&self) -> bool {
        *self == AuthorizationState::Authorized
    }

    /// Anything but `NotDetermined`: asking again will not change it
    pub fn is_resolved(&self) -> bool {
        *self != AuthorizationState::NotDetermined
    }

    /// States that keep a source out of the usable set
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            AuthorizationState::Denied
                | AuthorizationState::Restricted
                | AuthorizationState::Unavailable
        )
    }
}

type PendingPrompt = Shared<BoxFuture<'static, ConsentStatus>>;

/// Consent scope and kind of a prompt
type PromptKey = (usize, MediaSourceKind);

/// Prompts currently showing, shared by all gates in the process
static PENDING_PROMPTS: LazyLock<Mutex<HashMap<PromptKey, PendingPrompt>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn lock_pending() -> MutexGuard<'static, HashMap<PromptKey, PendingPrompt>> {
    PENDING_PROMPTS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queries and requests authorization per source kind
#[derive(Clone)]
pub struct AuthorizationGate {
    access: Arc<dyn DeviceAccess>,
}

impl AuthorizationGate {
    pub fn new(access: Arc<dyn DeviceAccess>) -> Self {
        Self { access }
    }

    /// Classify `kind` right now. No side effects.
    pub fn current_state(&self, kind: MediaSourceKind) -> AuthorizationState {
        AuthorizationState::classify(self.access.is_capable(kind), self.access.consent(kind))
    }

    /// Static capability check
    pub fn source_available(&self, kind: MediaSourceKind) -> bool {
        self.access.is_capable(kind)
    }

    /// Static consent check
    pub fn is_authorized(&self, kind: MediaSourceKind) -> bool {
        self.current_state(kind).is_usable()
    }

    /// Request authorization for `kind`, prompting only if undetermined
    ///
    /// Resolves immediately for already-resolved states. A second caller
    /// arriving while a prompt for the same kind and consent scope is
    /// showing waits for that prompt instead of opening another one, even
    /// when it came through a different gate.
    pub async fn request(&self, kind: MediaSourceKind, message: &str) -> AuthorizationState {
        let state = self.current_state(kind);
        if state.is_resolved() {
            debug!(kind = %kind, state = ?state, "Authorization already resolved");
            return state;
        }

        let prompt = self.pending_prompt(kind, message);
        let consent = prompt.clone().await;
        self.finish_prompt(kind, &prompt);

        let state = AuthorizationState::classify(self.access.is_capable(kind), consent);
        info!(kind = %kind, state = ?state, "Consent prompt answered");
        state
    }

    /// Callback form of [`request`](Self::request)
    ///
    /// The callback receives whether the source is now usable. Resolved
    /// states invoke it before returning; otherwise the prompt runs on the
    /// current tokio runtime.
    pub fn request_authorization<F>(&self, kind: MediaSourceKind, message: impl Into<String>, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let state = self.current_state(kind);
        if state.is_resolved() {
            callback(state.is_usable());
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(kind = %kind, "No tokio runtime for consent prompt, reporting not usable");
            callback(false);
            return;
        };

        let gate = self.clone();
        let message = message.into();
        runtime.spawn(async move {
            let state = gate.request(kind, &message).await;
            callback(state.is_usable());
        });
    }

    fn prompt_key(&self, kind: MediaSourceKind) -> PromptKey {
        (self.access.consent_scope(kind), kind)
    }

    fn pending_prompt(&self, kind: MediaSourceKind, message: &str) -> PendingPrompt {
        let key = self.prompt_key(kind);
        let mut pending = lock_pending();
        if let Some(prompt) = pending.get(&key) {
            debug!(kind = %kind, "Joining in-flight consent prompt");
            return prompt.clone();
        }

        info!(kind = %kind, "Presenting consent prompt");
        let prompt = self.access.prompt_consent(kind, message).shared();
        pending.insert(key, prompt.clone());
        prompt
    }

    fn finish_prompt(&self, kind: MediaSourceKind, prompt: &PendingPrompt) {
        let key = self.prompt_key(kind);
        let mut pending = lock_pending();
        if pending.get(&key).is_some_and(|current| current.ptr_eq(prompt)) {
            pending.remove(&key);
        }
    }

    /// Kinds with a prompt showing for this gate's backend
    pub fn pending_kinds(&self) -> Vec<MediaSourceKind> {
        let pending = lock_pending();
        MediaSourceKind::ALL
            .into_iter()
            .filter(|kind| pending.contains_key(&self.prompt_key(*kind)))
            .collect()
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("pending_prompts", &self.pending_kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scripted::ScriptedAccess;

    #[test]
    fn test_classify_capability_wins() {
        for consent in [
            ConsentStatus::NotDetermined,
            ConsentStatus::Granted,
            ConsentStatus::Denied,
            ConsentStatus::Restricted,
        ] {
            assert_eq!(
                AuthorizationState::classify(false, consent),
                AuthorizationState::Unavailable
            );
        }
        assert_eq!(
            AuthorizationState::classify(true, ConsentStatus::Granted),
            AuthorizationState::Authorized
        );
    }

    #[test]
    fn test_blocking_states() {
        assert!(AuthorizationState::Denied.is_blocking());
        assert!(AuthorizationState::Unavailable.is_blocking());
        assert!(!AuthorizationState::NotDetermined.is_blocking());
        assert!(!AuthorizationState::Authorized.is_blocking());
    }

    #[tokio::test]
    async fn test_request_resolved_state_does_not_prompt() {
        let access = Arc::new(
            ScriptedAccess::new().with_consent(MediaSourceKind::PhotoLibrary, ConsentStatus::Granted),
        );
        let gate = AuthorizationGate::new(access.clone());

        let state = gate.request(MediaSourceKind::PhotoLibrary, "msg").await;
        assert_eq!(state, AuthorizationState::Authorized);
        assert!(access.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_request_prompts_and_records_answer() {
        let access = Arc::new(
            ScriptedAccess::new().answer(MediaSourceKind::LiveCamera, ConsentStatus::Denied),
        );
        let gate = AuthorizationGate::new(access.clone());

        let state = gate.request(MediaSourceKind::LiveCamera, "msg").await;
        assert_eq!(state, AuthorizationState::Denied);
        assert_eq!(access.prompts(), vec![MediaSourceKind::LiveCamera]);

        // The answer sticks; a second request does not prompt again
        let state = gate.request(MediaSourceKind::LiveCamera, "msg").await;
        assert_eq!(state, AuthorizationState::Denied);
        assert_eq!(access.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_prompt() {
        let access = Arc::new(ScriptedAccess::new().hold_prompts());
        let gate = AuthorizationGate::new(access.clone());

        let first = tokio::spawn({
            let gate = gate.clone();
            async move { gate.request(MediaSourceKind::LiveCamera, "msg").await }
        });
        let second = tokio::spawn({
            let gate = gate.clone();
            async move { gate.request(MediaSourceKind::LiveCamera, "msg").await }
        });

        // Let both requests reach the pending prompt before answering
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        access.release_prompts();

        assert_eq!(first.await.unwrap(), AuthorizationState::Authorized);
        assert_eq!(second.await.unwrap(), AuthorizationState::Authorized);
        assert_eq!(access.prompts(), vec![MediaSourceKind::LiveCamera]);
    }

    #[tokio::test]
    async fn test_separate_gates_on_one_backend_share_one_prompt() {
        let access = Arc::new(ScriptedAccess::new().hold_prompts());
        let first_gate = AuthorizationGate::new(access.clone());
        let second_gate = AuthorizationGate::new(access.clone());

        let first = tokio::spawn(async move { first_gate.request(MediaSourceKind::LiveCamera, "msg").await });
        let second = tokio::spawn(async move { second_gate.request(MediaSourceKind::LiveCamera, "msg").await });

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            AuthorizationGate::new(access.clone()).pending_kinds(),
            vec![MediaSourceKind::LiveCamera]
        );
        access.release_prompts();

        assert_eq!(first.await.unwrap(), AuthorizationState::Authorized);
        assert_eq!(second.await.unwrap(), AuthorizationState::Authorized);
        assert_eq!(access.prompts(), vec![MediaSourceKind::LiveCamera]);
        assert!(AuthorizationGate::new(access).pending_kinds().is_empty());
    }

    #[tokio::test]
    async fn test_independent_backends_prompt_separately() {
        let one = Arc::new(ScriptedAccess::new());
        let other = Arc::new(ScriptedAccess::new());

        AuthorizationGate::new(one.clone()).request(MediaSourceKind::LiveCamera, "msg").await;
        AuthorizationGate::new(other.clone()).request(MediaSourceKind::LiveCamera, "msg").await;

        assert_eq!(one.prompts(), vec![MediaSourceKind::LiveCamera]);
        assert_eq!(other.prompts(), vec![MediaSourceKind::LiveCamera]);
    }

    #[tokio::test]
    async fn test_request_authorization_callback_immediate_when_resolved() {
        let access = Arc::new(ScriptedAccess::new().unavailable(MediaSourceKind::LiveCamera));
        let gate = AuthorizationGate::new(access);

        let (tx, rx) = std::sync::mpsc::channel();
        gate.request_authorization(MediaSourceKind::LiveCamera, "msg", move |usable| {
            tx.send(usable).unwrap();
        });
        // Delivered synchronously, before any await point
        assert_eq!(rx.try_recv(), Ok(false));
    }

    #[tokio::test]
    async fn test_request_authorization_callback_after_prompt() {
        let access = Arc::new(ScriptedAccess::new());
        let gate = AuthorizationGate::new(access.clone());

        let (tx, rx) = tokio::sync::oneshot::channel();
        gate.request_authorization(MediaSourceKind::PhotoLibrary, "msg", move |usable| {
            let _ = tx.send(usable);
        });
        assert!(rx.await.unwrap());
        assert_eq!(access.prompts(), vec![MediaSourceKind::PhotoLibrary]);
    }
}
