// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_CAMERA_DEVICE, DEFAULT_PERMISSION_MESSAGE,
    DEFAULT_SETTINGS_APP, DEFAULT_SETTINGS_PANEL,
};
use crate::errors::{PickerError, PickerResult};
use crate::types::MediaSourceKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// When consent prompts are shown during a pick
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptTiming {
    /// Prompt for every undetermined input before the chooser appears
    Upfront,
    /// Prompt only for the source the user picked
    #[default]
    OnSelection,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    /// Candidate sources, in presentation order
    pub inputs: Vec<MediaSourceKind>,
    /// Text shown with consent prompts and the settings redirect
    pub permission_message: String,
    /// Re-render delivered images upright
    pub normalize_image: bool,
    pub prompt_timing: PromptTiming,
    /// Directory scanned for the photo library
    pub photos_dir: PathBuf,
    /// Program the settings redirect runs; empty to open `settings_panel`
    /// with the desktop's default handler instead
    pub settings_app: String,
    /// Argument for `settings_app`, or a URI when `settings_app` is empty
    pub settings_panel: String,
    /// V4L2 node used for camera capture
    pub camera_device: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            inputs: MediaSourceKind::ALL.to_vec(),
            permission_message: DEFAULT_PERMISSION_MESSAGE.to_string(),
            normalize_image: false,
            prompt_timing: PromptTiming::default(),
            photos_dir: default_photos_dir(),
            settings_app: DEFAULT_SETTINGS_APP.to_string(),
            settings_panel: DEFAULT_SETTINGS_PANEL.to_string(),
            camera_device: DEFAULT_CAMERA_DEVICE.to_string(),
        }
    }
}

/// `~/Pictures`, or `./Pictures` when the user directories are unknown
pub fn default_photos_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("Pictures"))
}

impl PickerConfig {
    /// `$XDG_CONFIG_HOME/media-broker/config.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> PickerResult<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`
    ///
    /// A missing file yields the defaults. A file that exists but does not
    /// parse is an error rather than silently replaced.
    pub fn load_from(path: &Path) -> PickerResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| PickerError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), inputs = ?config.inputs, "Loaded config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> PickerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }
}
