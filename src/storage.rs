//! Per-user file storage for training images and menu images.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::utils::path::{safe_file_name, user_dir};

/// Delete the regular files in `<training_dir>/user<N>`; subdirectories are
/// left alone. Returns `None` when the user has no folder.
pub fn clear_training_images(training_dir: &Path, user_id: i32) -> Result<Option<usize>> {
    let dir = user_dir(training_dir, user_id);
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut removed = 0usize;
    for entry in std::fs::read_dir(&dir).with_context(|| format!("Failed to read {:?}", dir))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to delete training image"),
        }
    }
    info!(user_id, removed, "cleared training images");
    Ok(Some(removed))
}

/// Store an uploaded menu image as `<menu_dir>/user<N>/menu_<millis>.jpg`.
pub fn save_menu_image(menu_dir: &Path, user_id: i32, bytes: &[u8], now: NaiveDateTime) -> Result<PathBuf> {
    let dir = user_dir(menu_dir, user_id);
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let millis = now.and_utc().timestamp_millis();
    let mut path = dir.join(format!("menu_{}.jpg", millis));
    // Two uploads in the same millisecond must not overwrite each other.
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("menu_{}_{}.jpg", millis, n));
        n += 1;
    }
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    info!(user_id, path = %path.display(), "menu image stored");
    Ok(path)
}

/// Path of a stored menu image, if the name is acceptable and the file exists.
pub fn resolve_menu_image(menu_dir: &Path, user_id: i32, name: &str) -> Option<PathBuf> {
    let name = safe_file_name(name)?;
    let path = user_dir(menu_dir, user_id).join(name);
    path.is_file().then_some(path)
}
