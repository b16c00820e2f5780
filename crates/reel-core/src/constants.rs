//! Package-level constants.

use std::time::Duration;

/// Current version of reel (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "reel";

/// Remote debugging port used when none is configured.
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

/// Arguments passed to the browser ahead of the fixed capture flags.
pub const DEFAULT_BROWSER_ARGS: &str = "--headless --no-sandbox --force-device-scale-factor=1 \
--disable-background-timer-throttling --disable-renderer-backgrounding \
--disable-backgrounding-occluded-windows";

/// How long to wait for the discovery endpoint to list a target.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(20);

/// Interval between discovery polls.
pub const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for each screencast frame.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the reply to an ordinary command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on each teardown command.
pub const TEARDOWN_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Delay after removing the pause stylesheet.
pub const RESUME_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Timeout for the plain HTTP probe of the target URL.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// File name prefix for captured frames.
pub const FRAME_FILE_PREFIX: &str = "frame";

/// Zero-padded width of the frame index in file names.
pub const FRAME_INDEX_WIDTH: usize = 4;

/// Image format of captured frames, used both as the screencast format and
/// as the file extension.
pub const FRAME_EXTENSION: &str = "png";
