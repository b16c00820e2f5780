//! # reel
//!
//! Command-line entry point: loads settings, records the animation at
//! `--url` through a headless browser, then encodes the frames into an MP4.

#![deny(unsafe_code)]

mod shutdown;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use reel_capture::{
    BarReporter, CaptureOptions, CaptureSession, DirectorySink, NoopProgress, ProgressReporter,
    WsTransport, find_chrome,
};
use reel_core::constants::{NAME, VERSION};
use reel_core::logging::{LogFormat, init_subscriber};
use reel_core::{CaptureRequest, split_browser_args};
use reel_settings::ReelSettings;
use reel_video::{VideoAssembler, clear_directory, ensure_directory, find_ffmpeg, prepare_directory};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown::ShutdownCoordinator;

/// Record a web animation to video.
#[derive(Parser, Debug)]
#[command(
    name = "reel",
    version,
    about = "Record a web animation to MP4 through a headless browser"
)]
struct Cli {
    /// Page to capture.
    #[arg(long)]
    url: Option<String>,

    /// Capture length in seconds.
    #[arg(long)]
    duration: Option<f64>,

    /// Frames per second.
    #[arg(long)]
    fps: Option<u32>,

    /// Viewport width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Viewport height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Remote debugging port for the browser.
    #[arg(long)]
    chromium_debug_port: Option<u16>,

    /// Extra browser arguments, whitespace separated (replaces the defaults).
    #[arg(long, allow_hyphen_values = true)]
    chromium_args: Option<String>,

    /// Audio file muxed into the video.
    #[arg(long)]
    soundtrack: Option<PathBuf>,

    /// Settings file (defaults to `~/.reel/settings.json` when present).
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Browser executable (discovered automatically when omitted).
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// ffmpeg executable (discovered automatically when omitted).
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Directory receiving captured frames.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Directory receiving the finished video.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Per-frame timeout in milliseconds.
    #[arg(long)]
    frame_timeout_ms: Option<u64>,

    /// Keep the frame files after the video is built.
    #[arg(long)]
    keep_frames: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Load the settings layers, then put the command-line flags on top.
    fn settings(&self) -> Result<ReelSettings> {
        let mut settings = match &self.config_file {
            Some(path) => reel_settings::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => reel_settings::load_settings().context("Failed to load settings")?,
        };
        self.apply_to(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn apply_to(&self, settings: &mut ReelSettings) {
        let capture = &mut settings.capture;
        if let Some(url) = &self.url {
            capture.url = Some(url.clone());
        }
        if let Some(duration) = self.duration {
            capture.duration_secs = Some(duration);
        }
        if let Some(fps) = self.fps {
            capture.fps = fps;
        }
        if let Some(width) = self.width {
            capture.width = width;
        }
        if let Some(height) = self.height {
            capture.height = height;
        }

        let browser = &mut settings.browser;
        if let Some(port) = self.chromium_debug_port {
            browser.debug_port = port;
        }
        if let Some(args) = &self.chromium_args {
            browser.args.clone_from(args);
        }
        if let Some(chrome) = &self.chrome {
            browser.executable = Some(chrome.to_string_lossy().into_owned());
        }
        if let Some(ms) = self.frame_timeout_ms {
            browser.frame_timeout_ms = ms;
        }

        let video = &mut settings.video;
        if let Some(ffmpeg) = &self.ffmpeg {
            video.ffmpeg = Some(ffmpeg.to_string_lossy().into_owned());
        }
        if let Some(dir) = &self.frames_dir {
            video.frames_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(dir) = &self.output_dir {
            video.output_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(soundtrack) = &self.soundtrack {
            video.soundtrack = Some(soundtrack.to_string_lossy().into_owned());
        }
        if self.keep_frames {
            video.keep_frames = true;
        }

        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if self.log_json {
            settings.logging.format = LogFormat::Json;
        }
    }
}

/// Build the capture request from merged settings and check it.
fn build_request(settings: &ReelSettings) -> Result<CaptureRequest> {
    let capture = &settings.capture;
    let url = capture
        .url
        .clone()
        .context("No URL given (pass --url or set capture.url)")?;
    let duration = capture
        .duration_secs
        .context("No duration given (pass --duration or set capture.durationSecs)")?;

    let request = CaptureRequest::new(url, duration, capture.fps, capture.width, capture.height)
        .with_debug_port(settings.browser.debug_port)
        .with_browser_args(split_browser_args(&settings.browser.args));
    request.validate().context("Invalid capture request")?;
    Ok(request)
}

fn capture_options(
    settings: &ReelSettings,
    executable: PathBuf,
    frame_dir: PathBuf,
) -> CaptureOptions {
    let browser = &settings.browser;
    let mut options = CaptureOptions::new(executable, frame_dir);
    options.discovery_timeout = Duration::from_millis(browser.discovery_timeout_ms);
    options.frame_timeout = Duration::from_millis(browser.frame_timeout_ms);
    options.navigation_timeout = browser.navigation_timeout_ms.map(Duration::from_millis);
    options
}

/// Use the configured path when set, else run discovery.
fn resolve_tool(
    name: &str,
    configured: Option<&str>,
    discover: impl FnOnce() -> Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = configured {
        let path = PathBuf::from(path);
        if !path.is_file() {
            bail!("{name} not found at {}", path.display());
        }
        return Ok(path);
    }
    discover().with_context(|| format!("Could not find {name}; pass its path explicitly"))
}

fn progress_reporter(disabled: bool) -> Box<dyn ProgressReporter> {
    if disabled || !std::io::stderr().is_terminal() {
        Box::new(NoopProgress)
    } else {
        Box::new(BarReporter::new())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;
    init_subscriber(&settings.logging.level, settings.logging.format);
    info!(name = NAME, version = VERSION, "starting");

    let request = build_request(&settings)?;
    let frames_dir = PathBuf::from(&settings.video.frames_dir);
    let output_dir = PathBuf::from(&settings.video.output_dir);

    prepare_directory(&frames_dir)
        .await
        .with_context(|| format!("Failed to prepare frames directory: {}", frames_dir.display()))?;
    ensure_directory(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let chrome = resolve_tool(
        "Chrome/Chromium",
        settings.browser.executable.as_deref(),
        find_chrome,
    )?;
    let ffmpeg = resolve_tool("ffmpeg", settings.video.ffmpeg.as_deref(), find_ffmpeg)?;
    let soundtrack = settings.video.soundtrack.as_deref().map(PathBuf::from);
    if let Some(path) = &soundtrack {
        reel_video::validate_soundtrack(path)
            .with_context(|| format!("Invalid soundtrack: {}", path.display()))?;
    }

    let shutdown = ShutdownCoordinator::new();
    let cancel = shutdown.token();
    let signals = shutdown.listen_for_signals();

    info!(
        url = request.url.as_str(),
        frames = request.total_frames(),
        fps = request.fps,
        browser = %chrome.display(),
        "starting capture"
    );

    let progress = progress_reporter(cli.no_progress);
    let result = record(
        &settings,
        request,
        chrome,
        ffmpeg,
        soundtrack,
        progress.as_ref(),
        &cancel,
    )
    .await;

    shutdown.shutdown();
    let _ = signals.await;

    let video = result?;
    if settings.video.keep_frames {
        info!(dir = %frames_dir.display(), "keeping frames");
    } else {
        match clear_directory(&frames_dir).await {
            Ok(removed) => info!(removed, "frames cleaned up"),
            Err(e) => warn!(error = %e, "failed to clean frames directory"),
        }
    }

    println!("{}", video.display());
    Ok(())
}

/// Capture every frame, then encode them.
async fn record(
    settings: &ReelSettings,
    request: CaptureRequest,
    chrome: PathBuf,
    ffmpeg: PathBuf,
    soundtrack: Option<PathBuf>,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    let frames_dir = PathBuf::from(&settings.video.frames_dir);
    let fps = request.fps;
    let options = capture_options(settings, chrome, frames_dir.clone());

    let mut sink = DirectorySink::new(&frames_dir);
    let mut session = CaptureSession::<WsTransport>::new(request, options);
    let report = session
        .execute(&mut sink, progress, cancel)
        .await
        .context("Capture failed")?;
    info!(
        frames = report.frames,
        dir = %report.frame_dir.display(),
        elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "capture complete"
    );

    let mut assembler = VideoAssembler::new(ffmpeg, &frames_dir, &settings.video.output_dir);
    if let Some(path) = soundtrack {
        assembler = assembler.with_soundtrack(path);
    }
    assembler
        .assemble(fps, cancel)
        .await
        .context("Video assembly failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["reel"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn cli_defaults_are_unset() {
        let cli = cli(&[]);
        assert!(cli.url.is_none());
        assert!(cli.duration.is_none());
        assert!(!cli.keep_frames);
        assert!(!cli.no_progress);
        assert!(!cli.log_json);
    }

    #[test]
    fn cli_parses_capture_flags() {
        let cli = cli(&[
            "--url",
            "http://localhost:8080/anim.html",
            "--duration",
            "2.5",
            "--fps",
            "24",
            "--width",
            "640",
            "--height",
            "480",
            "--chromium-debug-port",
            "9333",
        ]);
        assert_eq!(cli.url.as_deref(), Some("http://localhost:8080/anim.html"));
        assert_eq!(cli.duration, Some(2.5));
        assert_eq!(cli.fps, Some(24));
        assert_eq!(cli.width, Some(640));
        assert_eq!(cli.height, Some(480));
        assert_eq!(cli.chromium_debug_port, Some(9333));
    }

    #[test]
    fn chromium_args_accepts_leading_dashes() {
        let cli = cli(&["--chromium-args", "--headless --disable-gpu"]);
        assert_eq!(cli.chromium_args.as_deref(), Some("--headless --disable-gpu"));
    }

    #[test]
    fn cli_rejects_bad_numbers() {
        assert!(Cli::try_parse_from(["reel", "--fps", "fast"]).is_err());
        assert!(Cli::try_parse_from(["reel", "--chromium-debug-port", "70000"]).is_err());
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = ReelSettings::default();
        settings.capture.fps = 60;
        settings.video.frames_dir = "from-file".into();

        cli(&[
            "--url",
            "http://example.com/",
            "--duration",
            "3",
            "--frames-dir",
            "/tmp/frames",
            "--frame-timeout-ms",
            "2500",
            "--keep-frames",
            "--log-level",
            "debug",
            "--log-json",
        ])
        .apply_to(&mut settings);

        assert_eq!(settings.capture.url.as_deref(), Some("http://example.com/"));
        assert_eq!(settings.capture.duration_secs, Some(3.0));
        assert_eq!(settings.capture.fps, 60);
        assert_eq!(settings.video.frames_dir, "/tmp/frames");
        assert_eq!(settings.browser.frame_timeout_ms, 2500);
        assert!(settings.video.keep_frames);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn absent_flags_leave_settings_alone() {
        let mut settings = ReelSettings::default();
        settings.video.keep_frames = true;
        settings.browser.args = "--headless".into();
        cli(&[]).apply_to(&mut settings);
        assert!(settings.video.keep_frames);
        assert_eq!(settings.browser.args, "--headless");
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    fn request_requires_url_and_duration() {
        let mut settings = ReelSettings::default();
        let err = build_request(&settings).unwrap_err();
        assert!(err.to_string().contains("No URL"), "{err}");

        settings.capture.url = Some("http://example.com/".into());
        let err = build_request(&settings).unwrap_err();
        assert!(err.to_string().contains("No duration"), "{err}");
    }

    #[test]
    fn request_carries_port_and_split_args() {
        let mut settings = ReelSettings::default();
        settings.capture.url = Some("http://example.com/".into());
        settings.capture.duration_secs = Some(1.0);
        settings.browser.debug_port = 9444;
        settings.browser.args = "--headless   --mute".into();

        let request = build_request(&settings).unwrap();
        assert_eq!(request.debug_port, 9444);
        assert_eq!(request.browser_args, vec!["--headless", "--mute"]);
        assert_eq!(request.total_frames(), 30);
    }

    #[test]
    fn request_rejects_invalid_url() {
        let mut settings = ReelSettings::default();
        settings.capture.url = Some("file:///tmp/a.html".into());
        settings.capture.duration_secs = Some(1.0);
        assert!(build_request(&settings).is_err());
    }

    #[test]
    fn options_follow_browser_settings() {
        let mut settings = ReelSettings::default();
        settings.browser.discovery_timeout_ms = 1500;
        settings.browser.frame_timeout_ms = 700;
        let options = capture_options(&settings, "/bin/chrome".into(), "frames".into());
        assert_eq!(options.discovery_timeout, Duration::from_millis(1500));
        assert_eq!(options.frame_timeout, Duration::from_millis(700));
        assert_eq!(options.navigation_timeout(), Duration::from_millis(700));

        settings.browser.navigation_timeout_ms = Some(4000);
        let options = capture_options(&settings, "/bin/chrome".into(), "frames".into());
        assert_eq!(options.navigation_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn resolve_tool_prefers_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("ffmpeg");
        std::fs::write(&exe, "").unwrap();

        let found = resolve_tool("ffmpeg", exe.to_str(), || None).unwrap();
        assert_eq!(found, exe);
    }

    #[test]
    fn resolve_tool_rejects_missing_configured_path() {
        let err = resolve_tool("ffmpeg", Some("/nonexistent/ffmpeg"), || {
            Some(PathBuf::from("/usr/bin/ffmpeg"))
        })
        .unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn resolve_tool_falls_back_to_discovery() {
        let found = resolve_tool("ffmpeg", None, || Some(PathBuf::from("/opt/ffmpeg"))).unwrap();
        assert_eq!(found, PathBuf::from("/opt/ffmpeg"));
        assert!(resolve_tool("ffmpeg", None, || None).is_err());
    }

    #[test]
    fn disabled_progress_is_noop() {
        let progress = progress_reporter(true);
        progress.started(3);
        progress.advanced(1, 3);
        progress.finished();
    }
}
