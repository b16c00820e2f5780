//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields keep their compiled default.

use reel_core::constants::{
    DEFAULT_BROWSER_ARGS, DEFAULT_DEBUG_PORT, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_FRAME_TIMEOUT,
};
use reel_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "capture": { "url": "http://localhost:8080/", "durationSecs": 4, "fps": 30 },
///   "browser": { "debugPort": 9333 },
///   "video": { "soundtrack": "music.mp3" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReelSettings {
    /// What to capture.
    pub capture: CaptureSettings,
    /// How to run the browser.
    pub browser: BrowserSettings,
    /// Frame storage and video assembly.
    pub video: VideoSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl ReelSettings {
    /// Reject values that can never produce a working capture.
    pub fn validate(&self) -> Result<()> {
        if self.browser.debug_port == 0 {
            return Err(SettingsError::InvalidValue("browser.debugPort must be non-zero".into()));
        }
        if self.browser.frame_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "browser.frameTimeoutMs must be non-zero".into(),
            ));
        }
        if self.browser.discovery_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "browser.discoveryTimeoutMs must be non-zero".into(),
            ));
        }
        if self.video.frames_dir.trim().is_empty() {
            return Err(SettingsError::InvalidValue("video.framesDir must not be empty".into()));
        }
        Ok(())
    }
}

/// The animation to capture.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Page to render. Required, either here or on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Capture length in seconds. Required, either here or on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Frames per second.
    pub fps: u32,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            url: None,
            duration_secs: None,
            fps: 30,
            width: 1280,
            height: 720,
        }
    }
}

/// Browser process settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
    /// Browser executable. Discovered automatically when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Remote debugging port.
    pub debug_port: u16,
    /// Extra launch arguments, whitespace separated.
    pub args: String,
    /// Discovery endpoint timeout in milliseconds.
    pub discovery_timeout_ms: u64,
    /// Per-frame timeout in milliseconds.
    pub frame_timeout_ms: u64,
    /// Page load timeout in milliseconds. Falls back to the frame timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_timeout_ms: Option<u64>,
}

impl Default for BrowserSettings {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            executable: None,
            debug_port: DEFAULT_DEBUG_PORT,
            args: DEFAULT_BROWSER_ARGS.to_string(),
            discovery_timeout_ms: DEFAULT_DISCOVERY_TIMEOUT.as_millis() as u64,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT.as_millis() as u64,
            navigation_timeout_ms: None,
        }
    }
}

/// Frame directory and video encoder settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    /// Encoder executable. Discovered automatically when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<String>,
    /// Directory receiving captured frames.
    pub frames_dir: String,
    /// Directory receiving finished videos.
    pub output_dir: String,
    /// Optional audio track muxed into the video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soundtrack: Option<String>,
    /// Keep the frame files after the video is built.
    pub keep_frames: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            frames_dir: "temp_images".to_string(),
            output_dir: "videos".to_string(),
            soundtrack: None,
            keep_frames: false,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
