//! Capture error types.

use std::path::PathBuf;

use reel_core::RequestError;
use thiserror::Error;

/// Errors that end a capture session.
///
/// Every variant is terminal: the session tears down and surfaces the error
/// without retrying.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The request was invalid or the target URL did not answer with 2xx.
    #[error("validation failed: {reason}")]
    Validation {
        /// Why the request was rejected.
        reason: String,
    },

    /// The browser process could not be started or died during startup.
    #[error("failed to launch browser: {context}")]
    Launch {
        /// What went wrong during launch.
        context: String,
    },

    /// The discovery endpoint never listed a target.
    #[error("DevTools did not respond on port {port} within {timeout_ms}ms")]
    DiscoveryTimeout {
        /// Debug port that was polled.
        port: u16,
        /// How long we waited.
        timeout_ms: u64,
    },

    /// The debugging socket could not be opened or was lost.
    #[error("connection to {url} failed: {reason}")]
    Connection {
        /// Socket URL.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// No complete message arrived within the receive timeout.
    #[error("no message received within {timeout_ms}ms")]
    ReceiveTimeout {
        /// How long we waited.
        timeout_ms: u64,
    },

    /// A command reply did not arrive in time.
    #[error("command '{method}' timed out after {timeout_ms}ms")]
    CommandTimeout {
        /// The command method.
        method: String,
        /// How long we waited.
        timeout_ms: u64,
    },

    /// The page did not fire its load event in time.
    #[error("page {url} did not finish loading within {timeout_ms}ms")]
    NavigationTimeout {
        /// The page being loaded.
        url: String,
        /// How long we waited.
        timeout_ms: u64,
    },

    /// No screencast frame arrived in time.
    #[error("no frame received after {timeout_ms}ms (frame {frame}/{total})")]
    FrameTimeout {
        /// 1-based index of the frame being waited for.
        frame: u32,
        /// Total frames requested.
        total: u32,
        /// How long we waited.
        timeout_ms: u64,
    },

    /// A frame file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A message had an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The browser answered a command with an error object.
    #[error("command '{method}' failed with code {code}: {message}")]
    Command {
        /// The command method.
        method: String,
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },

    /// The session was cancelled from outside.
    #[error("capture cancelled")]
    Cancelled,
}

impl From<RequestError> for CaptureError {
    fn from(err: RequestError) -> Self {
        Self::Validation {
            reason: err.to_string(),
        }
    }
}
