//! Frame persistence.

use std::path::PathBuf;

use async_trait::async_trait;
use reel_core::constants::{FRAME_EXTENSION, FRAME_FILE_PREFIX, FRAME_INDEX_WIDTH};
use tracing::trace;

use crate::cdp::codec::decode_base64;
use crate::error::CaptureError;

/// Receives decoded frames in capture order.
#[async_trait]
pub trait FrameSink: Send {
    /// Persist frame `index` (1-based) from its base64 payload.
    async fn write(&mut self, index: u32, encoded: &str) -> Result<PathBuf, CaptureError>;
}

/// File name for frame `index`, e.g. `frame0007.png`.
pub fn frame_file_name(index: u32) -> String {
    format!(
        "{FRAME_FILE_PREFIX}{index:0width$}.{FRAME_EXTENSION}",
        width = FRAME_INDEX_WIDTH
    )
}

/// Writes `frame%04d.png` files into one directory.
///
/// The directory must already exist; preparing it is the caller's job.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing PNG frames into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FrameSink for DirectorySink {
    async fn write(&mut self, index: u32, encoded: &str) -> Result<PathBuf, CaptureError> {
        let bytes = decode_base64(encoded)?;
        let path = self.dir.join(frame_file_name(index));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| CaptureError::Write {
                path: path.clone(),
                source,
            })?;
        trace!(index, bytes = bytes.len(), path = %path.display(), "frame written");
        Ok(path)
    }
}
