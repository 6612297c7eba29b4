// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the media broker

use crate::errors::PickError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A category of media-acquisition mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaSourceKind {
    /// The most recent photo in the user's library, fetched without UI
    #[serde(rename = "last-photo")]
    LastCapturedPhoto,
    /// A photo chosen from the library
    #[serde(rename = "library")]
    PhotoLibrary,
    /// A photo taken with the camera
    #[serde(rename = "camera")]
    LiveCamera,
}

impl MediaSourceKind {
    /// All kinds, in default presentation order
    pub const ALL: [MediaSourceKind; 3] = [
        MediaSourceKind::LastCapturedPhoto,
        MediaSourceKind::PhotoLibrary,
        MediaSourceKind::LiveCamera,
    ];

    /// Label shown in the chooser
    pub fn label(&self) -> &'static str {
        match self {
            MediaSourceKind::LastCapturedPhoto => "Last Photo Taken",
            MediaSourceKind::PhotoLibrary => "Choose from Library",
            MediaSourceKind::LiveCamera => "Take Photo",
        }
    }

    /// Stable identifier used in configuration and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            MediaSourceKind::LastCapturedPhoto => "last-photo",
            MediaSourceKind::PhotoLibrary => "library",
            MediaSourceKind::LiveCamera => "camera",
        }
    }
}

impl fmt::Display for MediaSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for MediaSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-photo" | "last-captured-photo" | "last" => Ok(MediaSourceKind::LastCapturedPhoto),
            "library" | "photo-library" | "photos" => Ok(MediaSourceKind::PhotoLibrary),
            "camera" | "live-camera" => Ok(MediaSourceKind::LiveCamera),
            other => Err(format!(
                "unknown source '{}' (expected last-photo, library or camera)",
                other
            )),
        }
    }
}

/// Image orientation, as carried by EXIF tag 0x0112
///
/// `Up` is upright. The rotated variants name where the top of the
/// stored pixels must end up for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl Orientation {
    /// Parse an EXIF orientation value (1-8)
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            1 => Some(Orientation::Up),
            2 => Some(Orientation::UpMirrored),
            3 => Some(Orientation::Down),
            4 => Some(Orientation::DownMirrored),
            5 => Some(Orientation::LeftMirrored),
            6 => Some(Orientation::Right),
            7 => Some(Orientation::RightMirrored),
            8 => Some(Orientation::Left),
            _ => None,
        }
    }

    /// EXIF orientation value (1-8)
    pub fn exif(&self) -> u8 {
        match self {
            Orientation::Up => 1,
            Orientation::UpMirrored => 2,
            Orientation::Down => 3,
            Orientation::DownMirrored => 4,
            Orientation::LeftMirrored => 5,
            Orientation::Right => 6,
            Orientation::RightMirrored => 7,
            Orientation::Left => 8,
        }
    }

    pub fn is_upright(&self) -> bool {
        *self == Orientation::Up
    }

    /// Check if displaying with this orientation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            Orientation::Left
                | Orientation::Right
                | Orientation::LeftMirrored
                | Orientation::RightMirrored
        )
    }
}

impl From<image::metadata::Orientation> for Orientation {
    fn from(orientation: image::metadata::Orientation) -> Self {
        Orientation::from_exif(orientation.to_exif()).unwrap_or_default()
    }
}

impl From<Orientation> for image::metadata::Orientation {
    fn from(orientation: Orientation) -> Self {
        image::metadata::Orientation::from_exif(orientation.exif())
            .unwrap_or(image::metadata::Orientation::NoTransforms)
    }
}

/// Ordered string → value metadata mapping
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Raw asset bytes with their MIME content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub data: Vec<u8>,
    /// MIME type, e.g. "image/jpeg"
    pub content_type: String,
}

impl MediaAsset {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Media as produced by a capture UI or the library, before packaging
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMedia {
    pub asset: MediaAsset,
    pub metadata: Metadata,
    pub orientation: Orientation,
}

impl CapturedMedia {
    pub fn new(asset: MediaAsset, orientation: Orientation) -> Self {
        Self {
            asset,
            metadata: Metadata::new(),
            orientation,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The payload of a successful pick
#[derive(Debug, Clone, PartialEq)]
pub struct PickedMedia {
    /// Source the user ended up picking from
    pub source: MediaSourceKind,
    pub asset: MediaAsset,
    pub metadata: Metadata,
    pub orientation: Orientation,
}

/// Outcome of one pick session, delivered exactly once
#[derive(Debug, Clone, PartialEq)]
pub enum PickResult {
    Success(PickedMedia),
    Cancelled,
    Failed(PickError),
}

impl PickResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PickResult::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PickResult::Cancelled)
    }

    /// The failure, if the pick failed
    pub fn error(&self) -> Option<&PickError> {
        match self {
            PickResult::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn media(&self) -> Option<&PickedMedia> {
        match self {
            PickResult::Success(media) => Some(media),
            _ => None,
        }
    }
}

/// Why a session stopped before delivering media
///
/// Components return `Result<T, Interruption>` so that a cancellation or a
/// failure at any stage propagates to the session with `?`.
#[derive(Debug, Clone, PartialEq)]
pub enum Interruption {
    Cancelled,
    Failed(PickError),
}

impl From<PickError> for Interruption {
    fn from(err: PickError) -> Self {
        Interruption::Failed(err)
    }
}

impl From<Interruption> for PickResult {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Cancelled => PickResult::Cancelled,
            Interruption::Failed(err) => PickResult::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("camera".parse(), Ok(MediaSourceKind::LiveCamera));
        assert_eq!("Library".parse(), Ok(MediaSourceKind::PhotoLibrary));
        assert_eq!("last-photo".parse(), Ok(MediaSourceKind::LastCapturedPhoto));
        assert!("scanner".parse::<MediaSourceKind>().is_err());
    }

    #[test]
    fn test_source_kind_serde_uses_ids() {
        let json = serde_json::to_string(&MediaSourceKind::ALL).unwrap();
        assert_eq!(json, r#"["last-photo","library","camera"]"#);
    }

    #[test]
    fn test_orientation_exif_mapping() {
        for value in 1..=8u8 {
            let orientation = Orientation::from_exif(value).unwrap();
            assert_eq!(orientation.exif(), value);
        }
        assert_eq!(Orientation::from_exif(0), None);
        assert_eq!(Orientation::from_exif(9), None);
    }

    #[test]
    fn test_orientation_matches_image_crate() {
        let rotated: image::metadata::Orientation = Orientation::Right.into();
        assert_eq!(rotated, image::metadata::Orientation::Rotate90);
        assert_eq!(Orientation::from(rotated), Orientation::Right);
        assert!(Orientation::Right.swaps_dimensions());
        assert!(!Orientation::Down.swaps_dimensions());
    }

    #[test]
    fn test_interruption_into_result() {
        assert!(PickResult::from(Interruption::Cancelled).is_cancelled());
        let failed: PickResult = Interruption::from(PickError::no_source_available()).into();
        assert_eq!(
            failed.error().map(|e| e.kind),
            Some(crate::errors::PickErrorKind::NoSourceAvailable)
        );
    }
}
