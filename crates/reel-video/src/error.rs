//! Video assembly error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from directory preparation and encoding.
#[derive(Debug, Error)]
pub enum VideoError {
    /// The frames directory holds no frame files.
    #[error("no frames found in {}", dir.display())]
    NoFrames {
        /// Directory that was scanned.
        dir: PathBuf,
    },

    /// ffmpeg could not be started.
    #[error("failed to start {}: {source}", program.display())]
    Launch {
        /// Executable that failed to start.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// ffmpeg exited unsuccessfully.
    #[error("ffmpeg exited with code {code}: {stderr}")]
    EncoderFailed {
        /// Exit code (-1 when killed by a signal).
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The soundtrack is missing or not an audio file.
    #[error("invalid soundtrack {}: {reason}", path.display())]
    InvalidSoundtrack {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Encoding was cancelled.
    #[error("video assembly cancelled")]
    Cancelled,

    /// Filesystem error.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VideoError>;

impl VideoError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
