//! Filesystem helpers for moving exports between scratch and output storage.
//!
//! Scratch and output directories may live on different filesystems, where
//! `rename` fails with EXDEV.

use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// EXDEV on Linux and macOS.
const EXDEV: i32 = 18;

/// Move `src` to `dst`, creating `dst`'s parent and falling back to
/// copy-then-rename when the two paths are on different devices.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            debug!("{} and {} are on different devices, copying", src.display(), dst.display());
            copy_across_devices(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn copy_across_devices(src: &Path, dst: &Path) -> MediaResult<()> {
    // Staging next to dst keeps the final rename on one filesystem
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!("Moved {} but could not remove the original: {}", src.display(), e);
    }
    Ok(())
}

/// Remove a directory tree, logging instead of failing.
///
/// A directory that is already gone counts as removed.
pub async fn remove_dir_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_dir_all(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Remove a single file, logging instead of failing.
pub async fn remove_file_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
