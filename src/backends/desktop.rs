// SPDX-License-Identifier: GPL-3.0-only

//! Linux desktop device access
//!
//! Photo sources are backed by the pictures directory, so their capability
//! is "the directory exists" and their consent is "the directory is
//! readable". The camera is capable only when this build can capture and
//! the configured node exists. Consent comes from the XDG camera portal;
//! without a portal the device node permissions decide. Camera answers are
//! cached for the life of the process and shared by every instance.

use super::DeviceAccess;
use super::library::PhotoDirectory;
use super::portal::CameraPortal;
use super::terminal::TerminalHost;
use super::v4l2::V4l2Camera;
use crate::authorization::{AuthorizationGate, ConsentStatus};
use crate::config::PickerConfig;
use crate::pipelines::ImageNormalizer;
use crate::session::BrokerContext;
use crate::types::MediaSourceKind;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

static CAMERA_CONSENT: LazyLock<Mutex<Option<ConsentStatus>>> = LazyLock::new(|| Mutex::new(None));

fn camera_consent() -> MutexGuard<'static, Option<ConsentStatus>> {
    CAMERA_CONSENT.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DesktopAccess {
    library: PhotoDirectory,
    camera: V4l2Camera,
}

impl DesktopAccess {
    pub fn new(photos_dir: impl Into<PathBuf>, camera: V4l2Camera) -> Self {
        Self {
            library: PhotoDirectory::new(photos_dir),
            camera,
        }
    }

    pub fn from_config(config: &PickerConfig) -> Self {
        Self::new(config.photos_dir.clone(), V4l2Camera::new(&config.camera_device))
    }
}

impl DeviceAccess for DesktopAccess {
    fn is_capable(&self, kind: MediaSourceKind) -> bool {
        match kind {
            MediaSourceKind::LastCapturedPhoto | MediaSourceKind::PhotoLibrary => self.library.exists(),
            MediaSourceKind::LiveCamera => self.camera.can_capture(),
        }
    }

    fn consent(&self, kind: MediaSourceKind) -> ConsentStatus {
        match kind {
            MediaSourceKind::LastCapturedPhoto | MediaSourceKind::PhotoLibrary => self.library.consent(),
            MediaSourceKind::LiveCamera => camera_consent().unwrap_or_default(),
        }
    }

    fn prompt_consent(&self, kind: MediaSourceKind, message: &str) -> BoxFuture<'static, ConsentStatus> {
        debug!(kind = %kind, prompt = message, "Consent requested");
        match kind {
            // Nothing to ask: the filesystem already decided
            MediaSourceKind::LastCapturedPhoto | MediaSourceKind::PhotoLibrary => {
                let consent = self.library.consent();
                async move { consent }.boxed()
            }
            MediaSourceKind::LiveCamera => {
                let device = self.camera.device().to_path_buf();
                async move {
                    let consent = prompt_camera(&device).await;
                    *camera_consent() = Some(consent);
                    consent
                }
                .boxed()
            }
        }
    }

    fn consent_scope(&self, kind: MediaSourceKind) -> usize {
        match kind {
            MediaSourceKind::LiveCamera => std::ptr::from_ref(&CAMERA_CONSENT) as usize,
            MediaSourceKind::LastCapturedPhoto | MediaSourceKind::PhotoLibrary => {
                std::ptr::from_ref(self) as usize
            }
        }
    }
}

async fn prompt_camera(device: &Path) -> ConsentStatus {
    match ask_portal().await {
        Ok(consent) => consent,
        Err(e) => {
            info!(error = %e, "Camera portal unavailable, checking device permissions");
            device_node_consent(device)
        }
    }
}

async fn ask_portal() -> Result<ConsentStatus, String> {
    let portal = CameraPortal::connect().await?;
    if !portal.is_camera_present().await? {
        return Err("portal reports no camera".to_string());
    }
    portal.access_camera().await
}

/// Outside a sandbox, access is whatever the node permissions allow
fn device_node_consent(device: &Path) -> ConsentStatus {
    match std::fs::File::options().read(true).write(true).open(device) {
        Ok(_) => ConsentStatus::Granted,
        Err(e) => {
            warn!(device = %device.display(), error = %e, "Camera device not accessible");
            ConsentStatus::Restricted
        }
    }
}

/// Broker collaborators for a terminal session on this desktop
pub fn desktop_context(config: &PickerConfig) -> BrokerContext {
    BrokerContext::new(
        Arc::new(DesktopAccess::from_config(config)),
        Arc::new(TerminalHost::from_config(config)),
        Arc::new(PhotoDirectory::new(config.photos_dir.clone())),
        Arc::new(ImageNormalizer::default()),
    )
}

static PLATFORM_GATE: LazyLock<AuthorizationGate> = LazyLock::new(|| {
    let config = PickerConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults for platform gate");
        PickerConfig::default()
    });
    AuthorizationGate::new(Arc::new(DesktopAccess::from_config(&config)))
});

/// Process-wide gate over the desktop backends
pub fn platform_gate() -> &'static AuthorizationGate {
    &PLATFORM_GATE
}
