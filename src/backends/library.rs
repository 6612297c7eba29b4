// SPDX-License-Identifier: GPL-3.0-only

//! Pictures-directory photo library
//!
//! The library is a plain directory of image files; the newest one by
//! modification time that decodes is the "last captured photo".

use super::MediaLibrary;
use crate::authorization::ConsentStatus;
use crate::constants::is_library_extension;
use crate::types::{CapturedMedia, MediaAsset, Orientation};
use futures::FutureExt;
use futures::future::BoxFuture;
use image::{ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PhotoDirectory {
    root: PathBuf,
}

impl PhotoDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Filesystem permissions are the only consent a directory has
    pub fn consent(&self) -> ConsentStatus {
        match std::fs::read_dir(&self.root) {
            Ok(_) => ConsentStatus::Granted,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => ConsentStatus::Restricted,
            Err(_) => ConsentStatus::NotDetermined,
        }
    }

    /// Load the newest library image that can be read, if any
    ///
    /// Unreadable or undecodable files are skipped in favour of the next
    /// newest one.
    pub async fn latest(&self) -> Result<Option<CapturedMedia>, String> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            for (path, modified) in candidates_newest_first(&root) {
                debug!(path = %path.display(), "Loading library photo");
                let loaded = std::fs::read(&path)
                    .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
                    .and_then(|data| media_from_file(&path, data, Some(modified)));
                match loaded {
                    Ok(media) => return Some(media),
                    Err(e) => warn!(error = %e, "Skipping library photo"),
                }
            }
            debug!(root = %root.display(), "No readable photos in library");
            None
        })
        .await
        .map_err(|e| format!("Library scan task error: {}", e))
    }
}

impl MediaLibrary for PhotoDirectory {
    fn latest_asset(&self) -> BoxFuture<'_, Option<CapturedMedia>> {
        async move {
            match self.latest().await {
                Ok(media) => media,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "Failed to load newest photo");
                    None
                }
            }
        }
        .boxed()
    }
}

/// Files with a library extension directly under `root`, newest first
fn candidates_newest_first(root: &Path) -> Vec<(PathBuf, SystemTime)> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut files: Vec<(PathBuf, SystemTime)> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| is_library_extension(&ext.to_string_lossy()))
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.path(), modified))
        })
        .collect();
    // Ties on mtime go to the later file name
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    files
}

/// Read an image file into captured media
///
/// Used for the newest-photo lookup and for files picked in a dialog.
pub async fn load(path: PathBuf) -> Result<CapturedMedia, String> {
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let modified = tokio::fs::metadata(&path).await.ok().and_then(|m| m.modified().ok());

    tokio::task::spawn_blocking(move || media_from_file(&path, data, modified))
        .await
        .map_err(|e| format!("Image decode task error: {}", e))?
}

/// Wrap encoded image bytes, detecting format, size and EXIF orientation
pub fn media_from_file(path: &Path, data: Vec<u8>, modified: Option<SystemTime>) -> Result<CapturedMedia, String> {
    let (content_type, width, height, orientation) = {
        let reader = ImageReader::new(Cursor::new(data.as_slice()))
            .with_guessed_format()
            .map_err(|e| format!("Failed to read the format of {}: {}", path.display(), e))?;
        let format = reader
            .format()
            .ok_or_else(|| format!("{} is not a recognized image", path.display()))?;
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;

        let orientation = decoder
            .orientation()
            .map(Orientation::from)
            .unwrap_or_default();
        let (width, height) = decoder.dimensions();
        (format.to_mime_type(), width, height, orientation)
    };

    let byte_size = data.len();
    let mut media = CapturedMedia::new(MediaAsset::new(data, content_type), orientation)
        .with_metadata("path", path.display().to_string())
        .with_metadata("byte_size", byte_size)
        .with_metadata("width", width)
        .with_metadata("height", height);

    if let Some(name) = path.file_name() {
        media = media.with_metadata("file_name", name.to_string_lossy().to_string());
    }
    if let Some(modified) = modified {
        let modified: chrono::DateTime<chrono::Local> = modified.into();
        media = media.with_metadata("modified", modified.to_rfc3339());
    }

    Ok(media)
}
