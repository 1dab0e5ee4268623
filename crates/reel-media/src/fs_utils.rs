//! Filesystem helpers for scratch artifacts and final outputs.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Unique path for one in-flight artifact of a scene.
///
/// Concurrent requests for the same scene never share a path.
pub fn unique_scene_path(work_dir: &Path, scene_index: u32, stem: &str, extension: &str) -> PathBuf {
    work_dir
        .join(format!("scene-{:03}", scene_index))
        .join(format!("{}-{}.{}", stem, Uuid::new_v4().simple(), extension))
}

/// Unique path for a timeline-level intermediate file.
pub fn unique_work_path(work_dir: &Path, stem: &str, extension: &str) -> PathBuf {
    work_dir.join(format!("{}-{}.{}", stem, Uuid::new_v4().simple(), extension))
}

/// Size of a file in bytes, `None` if it does not exist.
pub async fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).await.ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Move a finished file into place, copying when `src` and `dst` are on
/// different filesystems.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    // Stage next to dst so the final rename stays on one filesystem
    let staged = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staged).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staged, dst).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!("Failed to remove {} after copy: {}", src.display(), e);
    }
    Ok(())
}
