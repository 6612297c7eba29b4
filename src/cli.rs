// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for media picking
//!
//! Every command runs the library on a tokio runtime owned by the command,
//! with the desktop backends and the terminal host.

use chrono::Local;
use media_broker::backends::desktop::desktop_context;
use media_broker::backends::v4l2::V4l2Camera;
use media_broker::{
    CapturedMedia, MediaAsset, MediaPicker, MediaSourceKind, PickResult, PickerConfig, PromptTiming,
};
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config(path: Option<&Path>) -> Result<PickerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => PickerConfig::load_from(path)?,
        None => PickerConfig::load()?,
    };
    Ok(config)
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Pick a photo through the chooser and save it
pub fn pick(
    mut config: PickerConfig,
    sources: Vec<MediaSourceKind>,
    normalize: bool,
    upfront: bool,
    output: Option<PathBuf>,
) -> CliResult {
    if !sources.is_empty() {
        config.inputs = sources;
    }
    config.normalize_image |= normalize;
    if upfront {
        config.prompt_timing = PromptTiming::Upfront;
    }

    let result = runtime()?.block_on(async {
        let picker = MediaPicker::desktop(&config);
        picker.pick_async().await
    })?;

    match result {
        PickResult::Success(media) => {
            let path = output.unwrap_or_else(|| default_output(&media.asset));
            save(&media.asset, &path)?;
            println!("Picked from {} ({:?})", media.source.label(), media.orientation);
            println!("Saved to {}", path.display());
            println!("{}", serde_json::to_string_pretty(&media.metadata)?);
            Ok(())
        }
        PickResult::Cancelled => {
            println!("Cancelled.");
            Ok(())
        }
        PickResult::Failed(err) => Err(err.into()),
    }
}

/// Request access to `sources` (or the configured inputs)
pub fn request_access(mut config: PickerConfig, sources: Vec<MediaSourceKind>) -> CliResult {
    if !sources.is_empty() {
        config.inputs = sources;
    }

    let granted = runtime()?.block_on(async { MediaPicker::desktop(&config).access().await });
    if granted {
        println!("Access granted for all sources.");
    } else {
        println!("Access not granted for every source.");
    }
    Ok(())
}

/// Save the newest library photo
pub fn last_photo(config: PickerConfig, output: Option<PathBuf>) -> CliResult {
    let media = runtime()?.block_on(async { MediaPicker::desktop(&config).last_captured_photo().await })?;
    let path = output.unwrap_or_else(|| default_output(&media.asset));
    save(&media.asset, &path)?;
    print_summary(&media, &path)?;
    Ok(())
}

/// Print availability and authorization for every source kind
pub fn list_sources(config: PickerConfig) -> CliResult {
    let context = desktop_context(&config);

    println!("Sources:");
    println!();
    for kind in MediaSourceKind::ALL {
        let state = context.gate.current_state(kind);
        let marker = if config.inputs.contains(&kind) { "*" } else { " " };
        println!("  {} {:<11} {:<20} {:?}", marker, kind.id(), kind.label(), state);
    }
    println!();
    println!("  * = configured input");
    println!("  Photos: {}", config.photos_dir.display());
    println!("  Camera: {}", config.camera_device);
    let nodes = V4l2Camera::device_nodes();
    if !nodes.is_empty() {
        let nodes: Vec<String> = nodes.iter().map(|node| node.display().to_string()).collect();
        println!("  Video nodes: {}", nodes.join(", "));
    }
    if !cfg!(feature = "camera-v4l2") {
        println!("  (built without camera-v4l2, live capture is unavailable)");
    }
    Ok(())
}

fn print_summary(media: &CapturedMedia, path: &Path) -> CliResult {
    println!("Saved to {}", path.display());
    println!("{}", serde_json::to_string_pretty(&media.metadata)?);
    Ok(())
}

fn save(asset: &MediaAsset, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &asset.data)
}

fn default_output(asset: &MediaAsset) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("photo_{}.{}", timestamp, extension_for(&asset.content_type)))
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/tiff" => "tiff",
        "image/gif" => "gif",
        _ => "bin",
    }
}
