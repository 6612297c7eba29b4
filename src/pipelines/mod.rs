// SPDX-License-Identifier: GPL-3.0-only

//! Post-capture result pipeline
//!
//! Turns raw captured media into the payload delivered to the caller:
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────────┐     ┌──────────────┐
//! │ CapturedMedia│ ──▶ │    Result Pipeline     │ ──▶ │ PickedMedia  │
//! │ (raw bytes,  │     │  - orientation → Up    │     │ (asset, meta,│
//! │  orientation)│     │    (if requested)      │     │  source)     │
//! └──────────────┘     └────────────────────────┘     └──────────────┘
//! ```
//!
//! Normalization is CPU-bound and runs on tokio's blocking pool.
//!
//! # Modules
//!
//! - [`orientation`]: Orientation normalizer contract and the `image` crate implementation

pub mod orientation;

pub use orientation::{ImageNormalizer, OrientationNormalizer};

use crate::errors::PickError;
use crate::types::{CapturedMedia, MediaSourceKind, Orientation, PickedMedia};
use std::sync::Arc;
use tracing::{debug, info};

/// Packages captured media, normalizing orientation on request
pub struct ResultPipeline {
    normalizer: Arc<dyn OrientationNormalizer>,
}

impl ResultPipeline {
    pub fn new(normalizer: Arc<dyn OrientationNormalizer>) -> Self {
        Self { normalizer }
    }

    /// Produce the final payload for `source`
    ///
    /// With `normalize` set, image assets that are not already upright are
    /// re-rendered upright and reported as `Up`. Metadata is passed through
    /// untouched either way.
    pub async fn finalize(
        &self,
        source: MediaSourceKind,
        media: CapturedMedia,
        normalize: bool,
    ) -> Result<PickedMedia, PickError> {
        let CapturedMedia {
            mut asset,
            metadata,
            mut orientation,
        } = media;

        if normalize && asset.is_image() && !orientation.is_upright() {
            info!(
                orientation = ?orientation,
                bytes = asset.len(),
                content_type = %asset.content_type,
                "Normalizing orientation"
            );

            let normalizer = Arc::clone(&self.normalizer);
            let raw = asset.clone();
            let normalized = tokio::task::spawn_blocking(move || normalizer.normalize(&raw, orientation))
                .await
                .map_err(|e| PickError::native_capture(format!("Normalization task error: {}", e)))?
                .map_err(PickError::native_capture)?;

            asset.data = normalized;
            orientation = Orientation::Up;
            debug!(bytes = asset.len(), "Orientation normalized");
        }

        Ok(PickedMedia {
            source,
            asset,
            metadata,
            orientation,
        })
    }
}
