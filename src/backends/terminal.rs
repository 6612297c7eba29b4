// SPDX-License-Identifier: GPL-3.0-only

//! Terminal presentation host
//!
//! The chooser and prompts are plain numbered menus on stdin/stdout. The
//! library picker is the native file dialog and the camera is a single V4L2
//! frame.

use super::library;
use super::v4l2::V4l2Camera;
use super::{CaptureOutcome, ChooserOutcome, PresentationHost};
use crate::config::PickerConfig;
use crate::constants::LIBRARY_EXTENSIONS;
use crate::types::MediaSourceKind;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How the settings redirect reaches the system settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsLauncher {
    /// Run `app` with `panel` as its only argument
    App { app: String, panel: String },
    /// Hand a URI to the desktop's default handler
    Uri(String),
}

impl SettingsLauncher {
    pub fn from_config(config: &PickerConfig) -> Self {
        if config.settings_app.trim().is_empty() {
            SettingsLauncher::Uri(config.settings_panel.clone())
        } else {
            SettingsLauncher::App {
                app: config.settings_app.trim().to_string(),
                panel: config.settings_panel.clone(),
            }
        }
    }

    /// Start the settings in a detached process
    pub fn launch(&self) -> std::io::Result<()> {
        match self {
            SettingsLauncher::App { app, panel } => open::with_detached(panel, app.clone()),
            SettingsLauncher::Uri(uri) => open::that_detached(uri),
        }
    }
}

impl std::fmt::Display for SettingsLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsLauncher::App { app, panel } => write!(f, "{} {}", app, panel),
            SettingsLauncher::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

pub struct TerminalHost {
    settings: SettingsLauncher,
    photos_dir: PathBuf,
    camera: V4l2Camera,
}

impl TerminalHost {
    pub fn new(settings: SettingsLauncher, photos_dir: impl Into<PathBuf>, camera: V4l2Camera) -> Self {
        Self {
            settings,
            photos_dir: photos_dir.into(),
            camera,
        }
    }

    pub fn from_config(config: &PickerConfig) -> Self {
        Self::new(
            SettingsLauncher::from_config(config),
            config.photos_dir.clone(),
            V4l2Camera::new(&config.camera_device),
        )
    }

    async fn pick_library_file(&self) -> CaptureOutcome {
        let mut dialog = rfd::AsyncFileDialog::new()
            .set_title("Choose a photo")
            .add_filter("Images", &LIBRARY_EXTENSIONS);
        if self.photos_dir.is_dir() {
            dialog = dialog.set_directory(&self.photos_dir);
        }

        let Some(file) = dialog.pick_file().await else {
            return CaptureOutcome::Dismissed;
        };

        let path = file.path().to_path_buf();
        debug!(path = %path.display(), "File dialog returned");
        match library::load(path).await {
            Ok(media) => CaptureOutcome::Captured(media),
            Err(e) => CaptureOutcome::Failed(e),
        }
    }

    async fn take_photo(&self) -> CaptureOutcome {
        let prompt = format!(
            "Press Enter to take a photo with {} (q to cancel): ",
            self.camera.device().display()
        );
        match read_line(prompt).await {
            Some(answer) if !answer.trim().eq_ignore_ascii_case("q") => {}
            _ => return CaptureOutcome::Dismissed,
        }

        match self.camera.capture_frame().await {
            Ok(media) => CaptureOutcome::Captured(media),
            Err(e) => CaptureOutcome::Failed(e),
        }
    }
}

impl PresentationHost for TerminalHost {
    fn present_chooser<'a>(&'a self, options: &'a [MediaSourceKind]) -> BoxFuture<'a, ChooserOutcome> {
        async move {
            let menu = render_menu(options);
            loop {
                let Some(answer) = read_line(menu.clone()).await else {
                    return ChooserOutcome::Cancelled;
                };
                match parse_choice(&answer, options) {
                    Some(outcome) => return outcome,
                    None => println!("Please enter a number between 0 and {}.", options.len()),
                }
            }
        }
        .boxed()
    }

    fn present_settings_redirect<'a>(&'a self, kind: MediaSourceKind, message: &'a str) -> BoxFuture<'a, ()> {
        async move {
            let prompt = format!(
                "{}\nAccess to \"{}\" was refused. Open settings? [y/N]: ",
                message,
                kind.label()
            );
            let accepted = read_line(prompt)
                .await
                .is_some_and(|answer| is_yes(&answer));
            if !accepted {
                return;
            }

            info!(settings = %self.settings, "Opening settings");
            if let Err(e) = self.settings.launch() {
                warn!(settings = %self.settings, error = %e, "Failed to open settings");
                println!("Could not open settings ({}). Open them manually to allow access.", e);
            }
        }
        .boxed()
    }

    fn present_capture(&self, kind: MediaSourceKind) -> BoxFuture<'_, CaptureOutcome> {
        async move {
            match kind {
                MediaSourceKind::PhotoLibrary => self.pick_library_file().await,
                MediaSourceKind::LiveCamera => self.take_photo().await,
                MediaSourceKind::LastCapturedPhoto => {
                    CaptureOutcome::Failed("the last captured photo has no capture UI".to_string())
                }
            }
        }
        .boxed()
    }
}

fn render_menu(options: &[MediaSourceKind]) -> String {
    let mut menu = String::from("Choose a source:\n");
    for (index, kind) in options.iter().enumerate() {
        menu.push_str(&format!("  [{}] {}\n", index + 1, kind.label()));
    }
    menu.push_str("  [0] Cancel\n> ");
    menu
}

/// `None` when the input is not a valid menu entry
fn parse_choice(input: &str, options: &[MediaSourceKind]) -> Option<ChooserOutcome> {
    match input.trim().parse::<usize>().ok()? {
        0 => Some(ChooserOutcome::Cancelled),
        n => options.get(n - 1).copied().map(ChooserOutcome::Chosen),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Print `prompt` and read one line on the blocking pool; `None` on EOF
async fn read_line(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", prompt);
        let _ = stdout.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use MediaSourceKind::*;

    #[test]
    fn test_menu_lists_duplicates_separately() {
        let menu = render_menu(&[PhotoLibrary, LiveCamera, PhotoLibrary]);
        assert!(menu.contains("[1] Choose from Library"));
        assert!(menu.contains("[2] Take Photo"));
        assert!(menu.contains("[3] Choose from Library"));
        assert!(menu.contains("[0] Cancel"));
    }

    #[test]
    fn test_parse_choice() {
        let options = [LastCapturedPhoto, LiveCamera];
        assert_eq!(parse_choice("2\n", &options), Some(ChooserOutcome::Chosen(LiveCamera)));
        assert_eq!(parse_choice(" 0 ", &options), Some(ChooserOutcome::Cancelled));
        assert_eq!(parse_choice("3", &options), None);
        assert_eq!(parse_choice("camera", &options), None);
    }

    #[test]
    fn test_default_settings_launch_privacy_panel() {
        let launcher = SettingsLauncher::from_config(&PickerConfig::default());
        assert_eq!(
            launcher,
            SettingsLauncher::App {
                app: "gnome-control-center".to_string(),
                panel: "privacy".to_string(),
            }
        );
        assert_eq!(launcher.to_string(), "gnome-control-center privacy");

        let command = open::with_command("privacy", "gnome-control-center");
        assert_eq!(command.get_program(), "gnome-control-center");
        assert_eq!(command.get_args().collect::<Vec<_>>(), vec!["privacy"]);
    }

    #[test]
    fn test_empty_settings_app_opens_panel_as_uri() {
        let config = PickerConfig {
            settings_app: "  ".to_string(),
            settings_panel: "systemsettings://kcm_camera".to_string(),
            ..PickerConfig::default()
        };
        assert_eq!(
            SettingsLauncher::from_config(&config),
            SettingsLauncher::Uri("systemsettings://kcm_camera".to_string())
        );
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("Y\n"));
        assert!(is_yes("yes"));
        assert!(!is_yes(""));
        assert!(!is_yes("nope"));
    }
}
