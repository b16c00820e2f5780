//! Frame and output directory preparation.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, VideoError};

/// Create `dir` if missing; otherwise delete every file directly inside it.
///
/// Subdirectories are left untouched.
pub async fn prepare_directory(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir)
        .await
        .map_err(|e| VideoError::io(dir, e))?
    {
        let removed = clear_directory(dir).await?;
        debug!(dir = %dir.display(), removed, "cleared directory");
        Ok(())
    } else {
        ensure_directory(dir).await
    }
}

/// Create `dir` (and parents) if missing.
pub async fn ensure_directory(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| VideoError::io(dir, e))
}

/// Delete every file directly inside `dir`, returning how many were removed.
pub async fn clear_directory(dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| VideoError::io(dir, e))?;
    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| VideoError::io(dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| VideoError::io(&path, e))?;
        if file_type.is_dir() {
            continue;
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| VideoError::io(&path, e))?;
        removed += 1;
    }
    Ok(removed)
}
