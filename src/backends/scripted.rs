// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic in-memory backends
//!
//! These implement every backend trait from a script fixed up front and
//! record what the broker asked for, so the full pick flow can run without
//! a display, a camera or a D-Bus session. Hosts embedding the broker can
//! use them the same way in their own tests.

use super::{CaptureOutcome, ChooserOutcome, DeviceAccess, MediaLibrary, PresentationHost};
use crate::authorization::ConsentStatus;
use crate::types::{CapturedMedia, MediaAsset, MediaSourceKind, Orientation};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct AccessState {
    capable: HashMap<MediaSourceKind, bool>,
    consent: HashMap<MediaSourceKind, ConsentStatus>,
    answers: HashMap<MediaSourceKind, ConsentStatus>,
    prompts: Vec<MediaSourceKind>,
}

/// Scripted capability and consent
///
/// Defaults: every kind capable, every kind `NotDetermined`, every prompt
/// answered with `Granted`.
pub struct ScriptedAccess {
    state: Arc<Mutex<AccessState>>,
    release: watch::Sender<bool>,
}

impl ScriptedAccess {
    pub fn new() -> Self {
        let (release, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(AccessState {
                capable: HashMap::new(),
                consent: HashMap::new(),
                answers: HashMap::new(),
                prompts: Vec::new(),
            })),
            release,
        }
    }

    /// Set the current consent for `kind`
    pub fn with_consent(self, kind: MediaSourceKind, consent: ConsentStatus) -> Self {
        lock(&self.state).consent.insert(kind, consent);
        self
    }

    /// Mark `kind` as missing on this device
    pub fn unavailable(self, kind: MediaSourceKind) -> Self {
        lock(&self.state).capable.insert(kind, false);
        self
    }

    /// Answer prompts for `kind` with `answer`
    pub fn answer(self, kind: MediaSourceKind, answer: ConsentStatus) -> Self {
        lock(&self.state).answers.insert(kind, answer);
        self
    }

    /// Keep prompts pending until [`release_prompts`](Self::release_prompts)
    pub fn hold_prompts(self) -> Self {
        self.release.send_replace(false);
        self
    }

    pub fn release_prompts(&self) {
        self.release.send_replace(true);
    }

    /// Kinds prompted for, in order
    pub fn prompts(&self) -> Vec<MediaSourceKind> {
        lock(&self.state).prompts.clone()
    }
}

impl Default for ScriptedAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceAccess for ScriptedAccess {
    fn is_capable(&self, kind: MediaSourceKind) -> bool {
        lock(&self.state).capable.get(&kind).copied().unwrap_or(true)
    }

    fn consent(&self, kind: MediaSourceKind) -> ConsentStatus {
        lock(&self.state).consent.get(&kind).copied().unwrap_or_default()
    }

    fn prompt_consent(&self, kind: MediaSourceKind, _message: &str) -> BoxFuture<'static, ConsentStatus> {
        lock(&self.state).prompts.push(kind);
        let state = Arc::clone(&self.state);
        let mut released = self.release.subscribe();

        async move {
            // The sender lives as long as the ScriptedAccess; a dropped
            // sender just answers straight away.
            let _ = released.wait_for(|open| *open).await;

            let mut state = lock(&state);
            let answer = state
                .answers
                .get(&kind)
                .copied()
                .unwrap_or(ConsentStatus::Granted);
            state.consent.insert(kind, answer);
            answer
        }
        .boxed()
    }
}

/// Something the broker asked a [`ScriptedHost`] to present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Chooser(Vec<MediaSourceKind>),
    SettingsRedirect(MediaSourceKind),
    Capture(MediaSourceKind),
}

/// Scripted presentation host
///
/// Defaults: the chooser is cancelled and every capture UI is dismissed.
pub struct ScriptedHost {
    chooser: Mutex<ChooserOutcome>,
    captures: Mutex<HashMap<MediaSourceKind, CaptureOutcome>>,
    events: Mutex<Vec<HostEvent>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            chooser: Mutex::new(ChooserOutcome::Cancelled),
            captures: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// What the user does when the chooser appears
    pub fn choose(self, outcome: ChooserOutcome) -> Self {
        *lock(&self.chooser) = outcome;
        self
    }

    /// What the capture UI for `kind` returns
    pub fn capture(self, kind: MediaSourceKind, outcome: CaptureOutcome) -> Self {
        lock(&self.captures).insert(kind, outcome);
        self
    }

    pub fn events(&self) -> Vec<HostEvent> {
        lock(&self.events).clone()
    }

    pub fn chooser_presentations(&self) -> usize {
        self.count(|event| matches!(event, HostEvent::Chooser(_)))
    }

    pub fn settings_redirects(&self) -> usize {
        self.count(|event| matches!(event, HostEvent::SettingsRedirect(_)))
    }

    pub fn capture_presentations(&self) -> usize {
        self.count(|event| matches!(event, HostEvent::Capture(_)))
    }

    fn count(&self, filter: impl Fn(&HostEvent) -> bool) -> usize {
        lock(&self.events).iter().filter(|event| filter(event)).count()
    }

    fn record(&self, event: HostEvent) {
        lock(&self.events).push(event);
    }
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationHost for ScriptedHost {
    fn present_chooser<'a>(&'a self, options: &'a [MediaSourceKind]) -> BoxFuture<'a, ChooserOutcome> {
        self.record(HostEvent::Chooser(options.to_vec()));
        let outcome = *lock(&self.chooser);
        async move { outcome }.boxed()
    }

    fn present_settings_redirect<'a>(&'a self, kind: MediaSourceKind, _message: &'a str) -> BoxFuture<'a, ()> {
        self.record(HostEvent::SettingsRedirect(kind));
        async {}.boxed()
    }

    fn present_capture(&self, kind: MediaSourceKind) -> BoxFuture<'_, CaptureOutcome> {
        self.record(HostEvent::Capture(kind));
        let outcome = lock(&self.captures)
            .get(&kind)
            .cloned()
            .unwrap_or(CaptureOutcome::Dismissed);
        async move { outcome }.boxed()
    }
}

/// Scripted photo library holding at most one asset
#[derive(Default)]
pub struct ScriptedLibrary {
    latest: Option<CapturedMedia>,
}

impl ScriptedLibrary {
    pub fn empty() -> Self {
        Self { latest: None }
    }

    pub fn with_latest(media: CapturedMedia) -> Self {
        Self {
            latest: Some(media),
        }
    }
}

impl MediaLibrary for ScriptedLibrary {
    fn latest_asset(&self) -> BoxFuture<'_, Option<CapturedMedia>> {
        let latest = self.latest.clone();
        async move { latest }.boxed()
    }
}

/// A small PNG wrapped as captured media, for scripts
///
/// The image is `width` x `height`, red in the top-left pixel and blue
/// elsewhere, so orientation transforms are observable.
pub fn sample_png(width: u32, height: u32, orientation: Orientation) -> CapturedMedia {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        if x == 0 && y == 0 {
            image::Rgb([255, 0, 0])
        } else {
            image::Rgb([0, 0, 255])
        }
    });
    let mut data = Vec::new();
    // Encoding a well-formed in-memory RGB buffer as PNG cannot fail
    let _ = image.write_to(&mut std::io::Cursor::new(&mut data), image::ImageFormat::Png);

    CapturedMedia::new(MediaAsset::new(data, "image/png"), orientation)
        .with_metadata("width", width)
        .with_metadata("height", height)
}
