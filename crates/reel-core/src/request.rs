//! Capture request value and its validation rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_BROWSER_ARGS, DEFAULT_DEBUG_PORT};

/// Reasons a [`CaptureRequest`] is rejected before a session starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// No target URL was given.
    #[error("target URL is empty")]
    MissingUrl,

    /// The URL could not be parsed.
    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The URL scheme cannot be probed over HTTP.
    #[error("unsupported URL scheme \"{scheme}\" (only http and https are allowed)")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// A numeric field was zero, negative, or not finite.
    #[error("{field} must be greater than zero (got {value})")]
    NotPositive {
        /// Field name as it appears on the command line.
        field: &'static str,
        /// The offending value, formatted.
        value: String,
    },
}

/// Everything needed to capture one animation.
///
/// Construct with [`CaptureRequest::new`], adjust with the `with_*` builders,
/// then call [`CaptureRequest::validate`] before handing it to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Page to render.
    pub url: String,
    /// Capture length in seconds.
    pub duration_secs: f64,
    /// Frames per second.
    pub fps: u32,
    /// Viewport width in pixels.
    pub width: u32,
    /// Viewport height in pixels.
    pub height: u32,
    /// Remote debugging port for the browser.
    pub debug_port: u16,
    /// Extra browser arguments, placed before the fixed capture flags.
    pub browser_args: Vec<String>,
}

impl CaptureRequest {
    /// Create a request with the default port and browser arguments.
    pub fn new(
        url: impl Into<String>,
        duration_secs: f64,
        fps: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            url: url.into(),
            duration_secs,
            fps,
            width,
            height,
            debug_port: DEFAULT_DEBUG_PORT,
            browser_args: split_browser_args(DEFAULT_BROWSER_ARGS),
        }
    }

    /// Override the remote debugging port.
    #[must_use]
    pub fn with_debug_port(mut self, port: u16) -> Self {
        self.debug_port = port;
        self
    }

    /// Replace the extra browser arguments.
    #[must_use]
    pub fn with_browser_args(mut self, args: Vec<String>) -> Self {
        self.browser_args = args;
        self
    }

    /// Check every invariant a session relies on.
    pub fn validate(&self) -> Result<(), RequestError> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(RequestError::MissingUrl);
        }
        let parsed = url::Url::parse(trimmed).map_err(|e| RequestError::InvalidUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(RequestError::UnsupportedScheme {
                scheme: scheme.to_string(),
            });
        }

        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(RequestError::NotPositive {
                field: "duration",
                value: self.duration_secs.to_string(),
            });
        }
        for (field, value) in [("fps", self.fps), ("width", self.width), ("height", self.height)] {
            if value == 0 {
                return Err(RequestError::NotPositive {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.debug_port == 0 {
            return Err(RequestError::NotPositive {
                field: "debug port",
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Number of frames to capture: `ceil(duration × fps)`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn total_frames(&self) -> u32 {
        let frames = (self.duration_secs * f64::from(self.fps)).ceil();
        if frames <= 0.0 {
            0
        } else if frames >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            frames as u32
        }
    }

    /// Time between two frames, rounded to whole milliseconds.
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(rounded_ms(1000.0, self.fps))
    }

    /// Half a frame period, rounded to whole milliseconds.
    pub fn half_frame_period(&self) -> Duration {
        Duration::from_millis(rounded_ms(500.0, self.fps))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rounded_ms(numerator: f64, fps: u32) -> u64 {
    if fps == 0 {
        return 0;
    }
    (numerator / f64::from(fps)).round() as u64
}

/// Split a browser argument string on whitespace.
///
/// Quoting is not interpreted; arguments containing spaces are not supported.
pub fn split_browser_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(String::from).collect()
}
