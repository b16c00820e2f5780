//! Browser discovery and process supervision.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use reel_core::paths::is_executable;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::CaptureError;

/// Known browser locations, in search priority order.
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
    "/usr/local/bin/chromium",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/snap/bin/chromium",
];

/// Find a Chrome or Chromium binary.
///
/// Search order:
/// 1. `REEL_CHROME_PATH`, then `CHROME_PATH`
/// 2. A bundled `tools/<os>/chromium/chrome` next to the running binary
/// 3. Well-known system locations
pub fn find_chrome() -> Option<PathBuf> {
    for key in ["REEL_CHROME_PATH", "CHROME_PATH"] {
        if let Ok(env_path) = std::env::var(key) {
            let path = PathBuf::from(&env_path);
            if is_executable(&path) {
                return Some(path);
            }
            debug!(key, path = %env_path, "browser path set but not executable, falling through");
        }
    }

    if let Some(bundled) = bundled_path() {
        if is_executable(&bundled) {
            debug!(path = %bundled.display(), "found bundled browser");
            return Some(bundled);
        }
    }

    KNOWN_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| is_executable(p))
}

fn bundled_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let name = if cfg!(windows) { "chrome.exe" } else { "chrome" };
    Some(
        exe.parent()?
            .join("tools")
            .join(std::env::consts::OS)
            .join("chromium")
            .join(name),
    )
}

/// Full argument list: caller arguments first, then the fixed capture flags.
pub fn launch_args(extra_args: &[String], width: u32, height: u32, debug_port: u16) -> Vec<String> {
    let mut args = extra_args.to_vec();
    args.extend([
        "--mute-audio".to_string(),
        format!("--remote-debugging-port={debug_port}"),
        "--remote-debugging-address=127.0.0.1".to_string(),
        format!("--window-size={width},{height}"),
    ]);
    args
}

/// Lifecycle of a [`BrowserProcess`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrowserState {
    /// Spawned, debugging endpoint not yet seen.
    Launched,
    /// Debugging endpoint answered.
    Running,
    /// Killed or exited.
    Terminated,
}

/// One supervised browser process.
///
/// On Unix the browser leads its own process group so that [`terminate`]
/// also reaches renderer and GPU helpers.
///
/// [`terminate`]: BrowserProcess::terminate
pub struct BrowserProcess {
    child: Child,
    pid: Option<u32>,
    state: BrowserState,
    drains: Vec<JoinHandle<()>>,
}

impl BrowserProcess {
    /// Spawn `executable` with the capture flags appended to `extra_args`.
    pub fn launch(
        executable: &Path,
        width: u32,
        height: u32,
        debug_port: u16,
        extra_args: &[String],
    ) -> Result<Self, CaptureError> {
        let args = launch_args(extra_args, width, height, debug_port);
        let mut cmd = Command::new(executable);
        let _ = cmd
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = executable.parent().filter(|d| d.is_dir()) {
            let _ = cmd.current_dir(dir);
        }
        #[cfg(unix)]
        let _ = cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| CaptureError::Launch {
            context: format!("{}: {e}", executable.display()),
        })?;
        let pid = child.id();
        info!(pid, executable = %executable.display(), debug_port, "browser launched");

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(tokio::spawn(drain_lines(stdout, "stdout")));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(tokio::spawn(drain_lines(stderr, "stderr")));
        }

        Ok(Self {
            child,
            pid,
            state: BrowserState::Launched,
            drains,
        })
    }

    /// OS process id, if the process was started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BrowserState {
        self.state
    }

    /// Record that the debugging endpoint answered.
    pub fn mark_running(&mut self) {
        if self.state == BrowserState::Launched {
            self.state = BrowserState::Running;
        }
    }

    /// Wait for the process to exit on its own.
    ///
    /// Cancel-safe, so it can race discovery in a `select!`.
    pub async fn wait_exit(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kill the process and its descendants. A no-op once terminated.
    pub async fn terminate(&mut self) {
        if self.state == BrowserState::Terminated {
            return;
        }
        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                kill_process_group(pid).await;
            }
        }
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "browser already gone");
        }
        for drain in self.drains.drain(..) {
            drain.abort();
        }
        self.state = BrowserState::Terminated;
        debug!(pid = self.pid, "browser terminated");
    }
}

impl Drop for BrowserProcess {
    fn drop(&mut self) {
        if self.state != BrowserState::Terminated {
            warn!(pid = self.pid, "browser dropped without terminate, killing");
            let _ = self.child.start_kill();
            for drain in &self.drains {
                drain.abort();
            }
        }
    }
}

#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let status = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        debug!(pid, error = %e, "process group kill failed");
    }
}

async fn drain_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!(target: "reel::browser", stream, "{line}");
    }
}
