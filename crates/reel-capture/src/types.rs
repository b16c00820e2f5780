//! Capture session types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reel_core::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_FRAME_TIMEOUT,
    DISCOVERY_POLL_INTERVAL, FRAME_EXTENSION, RESUME_SETTLE_DELAY, TEARDOWN_COMMAND_TIMEOUT,
};
use serde::Serialize;
use serde_json::{Value, json};

/// Screencast configuration sent with `Page.startScreencast`.
///
/// Frames are always PNG, pushed for every rendered frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreencastOptions {
    /// Maximum capture width.
    pub max_width: u32,
    /// Maximum capture height.
    pub max_height: u32,
}

impl ScreencastOptions {
    /// Frames bounded by the viewport size.
    pub fn for_viewport(width: u32, height: u32) -> Self {
        Self {
            max_width: width,
            max_height: height,
        }
    }

    /// Command parameters for `Page.startScreencast`.
    pub fn to_params(self) -> Value {
        json!({
            "format": FRAME_EXTENSION,
            "maxWidth": self.max_width,
            "maxHeight": self.max_height,
            "everyNthFrame": 1,
        })
    }
}

/// Where a capture session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureState {
    /// Nothing started yet.
    Idle,
    /// Browser process being spawned.
    Launching,
    /// Polling the discovery endpoint.
    AwaitingDevTools,
    /// Socket open.
    Connected,
    /// Pause stylesheet registered.
    AnimationsPaused,
    /// Navigation issued, waiting for load.
    Navigating,
    /// Load event received.
    PageLoaded,
    /// Pause stylesheet removed.
    AnimationsResumed,
    /// Repaint animation installed.
    RepaintInjected,
    /// Frames are being pushed.
    ScreencastRunning,
    /// Tearing down.
    Draining,
    /// Finished successfully.
    Stopped,
    /// Finished with an error.
    Failed,
}

impl CaptureState {
    /// Whether the session has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Launching => "launching",
            Self::AwaitingDevTools => "awaiting_devtools",
            Self::Connected => "connected",
            Self::AnimationsPaused => "animations_paused",
            Self::Navigating => "navigating",
            Self::PageLoaded => "page_loaded",
            Self::AnimationsResumed => "animations_resumed",
            Self::RepaintInjected => "repaint_injected",
            Self::ScreencastRunning => "screencast_running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Runtime knobs for a capture session.
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    /// Browser executable to launch.
    pub executable: PathBuf,
    /// Directory receiving frame files (reported back in [`CaptureReport`]).
    pub frame_dir: PathBuf,
    /// Discovery endpoint timeout.
    pub discovery_timeout: Duration,
    /// Delay between discovery polls.
    pub discovery_poll_interval: Duration,
    /// Per-frame timeout.
    pub frame_timeout: Duration,
    /// Page load timeout. `None` uses the frame timeout.
    pub navigation_timeout: Option<Duration>,
    /// Timeout for ordinary command replies.
    pub command_timeout: Duration,
    /// Timeout for each best-effort teardown command.
    pub teardown_timeout: Duration,
    /// Pause after resuming animations.
    pub settle_delay: Duration,
}

impl CaptureOptions {
    /// Defaults for the given browser and frame directory.
    pub fn new(executable: impl Into<PathBuf>, frame_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            frame_dir: frame_dir.into(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            discovery_poll_interval: DISCOVERY_POLL_INTERVAL,
            frame_timeout: DEFAULT_FRAME_TIMEOUT,
            navigation_timeout: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            teardown_timeout: TEARDOWN_COMMAND_TIMEOUT,
            settle_delay: RESUME_SETTLE_DELAY,
        }
    }

    /// Effective page load timeout.
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout.unwrap_or(self.frame_timeout)
    }
}

/// Summary of a successful capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureReport {
    /// Number of frame files written.
    pub frames: u32,
    /// Directory holding them.
    pub frame_dir: PathBuf,
    /// Wall-clock time from launch to teardown.
    pub elapsed: Duration,
}

/// Whole milliseconds in `d`, saturating.
pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
