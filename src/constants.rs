// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Permission message shown when the caller does not configure one
pub const DEFAULT_PERMISSION_MESSAGE: &str =
    "This app needs access to your photos and camera so you can choose a picture.";

/// Settings application launched by the settings redirect
pub const DEFAULT_SETTINGS_APP: &str = "gnome-control-center";

/// Panel passed to [`DEFAULT_SETTINGS_APP`], the one holding camera and
/// photo access switches
pub const DEFAULT_SETTINGS_PANEL: &str = "privacy";

/// Camera device used for live capture when none is configured
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Directory name under the user's config dir
pub const CONFIG_DIR_NAME: &str = "media-broker";

/// Configuration file name inside [`CONFIG_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.json";

/// JPEG quality used when re-encoding a normalized image (0-100)
pub const NORMALIZED_JPEG_QUALITY: u8 = 92;

/// File extensions the photo library scans for
pub const LIBRARY_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "tif", "tiff", "gif"];

/// Number of mmap buffers requested from V4L2 for a single capture
pub const CAMERA_BUFFER_COUNT: u32 = 4;

/// Frames discarded before the captured one, so auto exposure can settle
pub const CAMERA_WARMUP_FRAMES: usize = 3;

/// Check whether a path extension is one the library recognizes
pub fn is_library_extension(ext: &str) -> bool {
    LIBRARY_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}
