// SPDX-License-Identifier: GPL-3.0-only

//! Single-frame camera capture through V4L2
//!
//! Opens the device, asks for MJPEG so the frame is already an encoded
//! JPEG, lets auto exposure settle for a few frames and keeps the next one.
//! The capture itself needs the `camera-v4l2` feature.

use crate::types::CapturedMedia;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct V4l2Camera {
    device: PathBuf,
}

impl V4l2Camera {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self { device: device.into() }
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    pub fn is_present(&self) -> bool {
        self.device.exists()
    }

    /// Whether [`capture_frame`](Self::capture_frame) can succeed at all:
    /// the build has V4L2 support and the configured node exists
    pub fn can_capture(&self) -> bool {
        cfg!(feature = "camera-v4l2") && self.is_present()
    }

    /// `/dev/video*` nodes, sorted
    pub fn device_nodes() -> Vec<PathBuf> {
        device_nodes_in(Path::new("/dev"))
    }

    /// Grab one JPEG frame on tokio's blocking pool
    pub async fn capture_frame(&self) -> Result<CapturedMedia, String> {
        let device = self.device.clone();
        info!(device = %device.display(), "Capturing camera frame");
        tokio::task::spawn_blocking(move || capture_blocking(&device))
            .await
            .map_err(|e| format!("Camera capture task error: {}", e))?
    }
}

fn device_nodes_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut nodes: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("video"))
        .map(|entry| entry.path())
        .collect();
    nodes.sort();
    nodes
}

#[cfg(feature = "camera-v4l2")]
fn capture_blocking(device: &Path) -> Result<CapturedMedia, String> {
    use crate::constants::{CAMERA_BUFFER_COUNT, CAMERA_WARMUP_FRAMES};
    use crate::types::{MediaAsset, Orientation};
    use tracing::debug;
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;
    use v4l::prelude::*;
    use v4l::video::Capture;

    let mut dev = Device::with_path(device)
        .map_err(|e| format!("Failed to open V4L2 device {}: {}", device.display(), e))?;

    let mjpg = v4l::FourCC::new(b"MJPG");
    let mut format = dev
        .format()
        .map_err(|e| format!("Failed to query format: {}", e))?;
    format.fourcc = mjpg;
    let format = dev
        .set_format(&format)
        .map_err(|e| format!("Failed to set format: {}", e))?;
    if format.fourcc != mjpg {
        return Err(format!(
            "{} does not offer MJPEG frames (got {})",
            device.display(),
            format.fourcc
        ));
    }
    debug!(width = format.width, height = format.height, "Set V4L2 MJPEG format");

    let mut stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, CAMERA_BUFFER_COUNT)
        .map_err(|e| format!("Failed to create buffer stream: {}", e))?;

    for _ in 0..CAMERA_WARMUP_FRAMES {
        stream
            .next()
            .map_err(|e| format!("Failed to read warm-up frame: {}", e))?;
    }

    let (buf, meta) = stream
        .next()
        .map_err(|e| format!("Failed to read frame: {}", e))?;
    let used = (meta.bytesused as usize).min(buf.len());
    if used == 0 {
        return Err("Camera returned an empty frame".to_string());
    }

    Ok(CapturedMedia::new(MediaAsset::new(buf[..used].to_vec(), "image/jpeg"), Orientation::Up)
        .with_metadata("device", device.display().to_string())
        .with_metadata("width", format.width)
        .with_metadata("height", format.height)
        .with_metadata("sequence", meta.sequence)
        .with_metadata("captured_at", chrono::Local::now().to_rfc3339()))
}

#[cfg(not(feature = "camera-v4l2"))]
fn capture_blocking(device: &Path) -> Result<CapturedMedia, String> {
    Err(format!(
        "Cannot capture from {}: built without the camera-v4l2 feature",
        device.display()
    ))
}
