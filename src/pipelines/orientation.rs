// SPDX-License-Identifier: GPL-3.0-only

//! Orientation normalization
//!
//! The broker only relies on the [`OrientationNormalizer`] contract: given
//! encoded image bytes and their orientation, return encoded bytes that
//! display upright with no orientation tag. Same input, same output.

use crate::constants::NORMALIZED_JPEG_QUALITY;
use crate::types::{MediaAsset, Orientation};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Pure transform from (bytes, orientation) to upright bytes
pub trait OrientationNormalizer: Send + Sync {
    fn normalize(&self, asset: &MediaAsset, orientation: Orientation) -> Result<Vec<u8>, String>;
}

/// Normalizer backed by the `image` crate
///
/// Decodes, applies the orientation, and re-encodes in the source format.
/// JPEG is re-encoded at a fixed quality; formats without an encoder in the
/// `image` crate fall back to PNG.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    jpeg_quality: u8,
}

impl ImageNormalizer {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, String> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            ImageFormat::Jpeg => {
                let rgb = image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, self.jpeg_quality);
                encoder
                    .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
                    .map_err(|e| format!("JPEG encoding failed: {}", e))?;
            }
            format if format.writing_enabled() => {
                image
                    .write_to(&mut cursor, format)
                    .map_err(|e| format!("{:?} encoding failed: {}", format, e))?;
            }
            _ => {
                image
                    .write_to(&mut cursor, ImageFormat::Png)
                    .map_err(|e| format!("PNG encoding failed: {}", e))?;
            }
        }

        Ok(buffer)
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(NORMALIZED_JPEG_QUALITY)
    }
}

impl OrientationNormalizer for ImageNormalizer {
    fn normalize(&self, asset: &MediaAsset, orientation: Orientation) -> Result<Vec<u8>, String> {
        let format =
            image::guess_format(&asset.data).map_err(|e| format!("Unrecognized image data: {}", e))?;
        let mut image = image::load_from_memory_with_format(&asset.data, format)
            .map_err(|e| format!("Failed to decode image: {}", e))?;

        image.apply_orientation(orientation.into());
        debug!(
            format = ?format,
            width = image.width(),
            height = image.height(),
            "Applied orientation"
        );

        self.encode(&image, format)
    }
}
