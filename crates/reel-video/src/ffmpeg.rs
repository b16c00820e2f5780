//! ffmpeg discovery and invocation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Local};
use reel_core::constants::{FRAME_EXTENSION, FRAME_FILE_PREFIX, FRAME_INDEX_WIDTH};
use reel_core::paths::is_executable;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, VideoError};

/// Audio extensions accepted for the soundtrack.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "m4a", "ogg", "flac", "opus"];

/// Find an ffmpeg binary.
///
/// Search order:
/// 1. `REEL_FFMPEG_PATH`, then `FFMPEG_PATH`
/// 2. A bundled `tools/<os>/ffmpeg/ffmpeg` next to the running binary
/// 3. Every directory on `PATH`
pub fn find_ffmpeg() -> Option<PathBuf> {
    for key in ["REEL_FFMPEG_PATH", "FFMPEG_PATH"] {
        if let Ok(env_path) = std::env::var(key) {
            let path = PathBuf::from(&env_path);
            if is_executable(&path) {
                return Some(path);
            }
            debug!(key, path = %env_path, "ffmpeg path set but not executable, falling through");
        }
    }

    let name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    if let Some(dir) = exe_dir {
        let bundled = dir
            .join("tools")
            .join(std::env::consts::OS)
            .join("ffmpeg")
            .join(name);
        if is_executable(&bundled) {
            return Some(bundled);
        }
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|p| is_executable(p))
}

/// Check that `path` exists and carries an audio extension.
pub fn validate_soundtrack(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(VideoError::InvalidSoundtrack {
            path: path.to_path_buf(),
            reason: "file does not exist".into(),
        });
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(VideoError::InvalidSoundtrack {
            path: path.to_path_buf(),
            reason: format!("unsupported extension '{ext}'"),
        });
    }
    Ok(())
}

/// Encodes a directory of numbered frames into an MP4.
#[derive(Clone, Debug)]
pub struct VideoAssembler {
    ffmpeg: PathBuf,
    frames_dir: PathBuf,
    output_dir: PathBuf,
    soundtrack: Option<PathBuf>,
}

impl VideoAssembler {
    /// Assembler reading from `frames_dir` and writing into `output_dir`.
    pub fn new(
        ffmpeg: impl Into<PathBuf>,
        frames_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            frames_dir: frames_dir.into(),
            output_dir: output_dir.into(),
            soundtrack: None,
        }
    }

    /// Mux `path` as the audio track, trimmed to the video length.
    #[must_use]
    pub fn with_soundtrack(mut self, path: impl Into<PathBuf>) -> Self {
        self.soundtrack = Some(path.into());
        self
    }

    /// `output_<yyyyMMddHHmmss>.mp4` inside the output directory.
    pub fn output_path(&self, now: DateTime<Local>) -> PathBuf {
        self.output_dir
            .join(format!("output_{}.mp4", now.format("%Y%m%d%H%M%S")))
    }

    /// [`output_path`](Self::output_path), suffixed `_1`, `_2`, ... until
    /// no existing file has the name.
    pub async fn free_output_path(&self, now: DateTime<Local>) -> Result<PathBuf> {
        let stamp = now.format("%Y%m%d%H%M%S");
        let mut candidate = self.output_path(now);
        let mut n = 0u32;
        while tokio::fs::try_exists(&candidate)
            .await
            .map_err(|e| VideoError::io(&candidate, e))?
        {
            n += 1;
            candidate = self.output_dir.join(format!("output_{stamp}_{n}.mp4"));
        }
        Ok(candidate)
    }

    /// Full ffmpeg argument list for an encode at `fps` into `output`.
    pub fn build_args(&self, fps: u32, output: &Path) -> Vec<OsString> {
        let pattern = self
            .frames_dir
            .join(format!("{FRAME_FILE_PREFIX}%0{FRAME_INDEX_WIDTH}d.{FRAME_EXTENSION}"));

        // -n: an existing output fails the encode rather than being replaced.
        let mut args: Vec<OsString> = ["-n", "-framerate"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(fps.to_string().into());
        args.extend(
            ["-start_number", "1", "-loglevel", "error", "-i"]
                .iter()
                .map(OsString::from),
        );
        args.push(pattern.into_os_string());
        if let Some(soundtrack) = &self.soundtrack {
            args.push("-i".into());
            args.push(soundtrack.clone().into_os_string());
        }
        args.extend(
            [
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
            ]
            .iter()
            .map(OsString::from),
        );
        if self.soundtrack.is_some() {
            args.extend(["-c:a", "aac", "-shortest"].iter().map(OsString::from));
        }
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Number of `frame*.png` files in the frames directory.
    pub async fn count_frames(&self) -> Result<usize> {
        let dir = &self.frames_dir;
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| VideoError::io(dir, e))?;
        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VideoError::io(dir, e))?
        {
            let path = entry.path();
            let is_frame = path.extension().is_some_and(|ext| ext == FRAME_EXTENSION);
            let name = entry.file_name();
            if is_frame && name.to_string_lossy().starts_with(FRAME_FILE_PREFIX) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Encode the frames at `fps` and return the video path.
    pub async fn assemble(&self, fps: u32, cancel: &CancellationToken) -> Result<PathBuf> {
        let frames = self.count_frames().await?;
        if frames == 0 {
            return Err(VideoError::NoFrames {
                dir: self.frames_dir.clone(),
            });
        }
        if let Some(soundtrack) = &self.soundtrack {
            validate_soundtrack(soundtrack)?;
        }

        let output = self.free_output_path(Local::now()).await?;
        let args = self.build_args(fps, &output);
        debug!(program = %self.ffmpeg.display(), ?args, "running ffmpeg");

        let mut cmd = tokio::process::Command::new(&self.ffmpeg);
        let _ = cmd
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = cmd.spawn().map_err(|source| VideoError::Launch {
            program: self.ffmpeg.clone(),
            source,
        })?;

        let result = tokio::select! {
            result = child.wait_with_output() => {
                result.map_err(|e| VideoError::io(&self.ffmpeg, e))?
            }
            () = cancel.cancelled() => return Err(VideoError::Cancelled),
        };

        if !result.status.success() {
            return Err(VideoError::EncoderFailed {
                code: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        info!(frames, fps, output = %output.display(), "video assembled");
        Ok(output)
    }
}
