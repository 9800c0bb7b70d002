//! Data directory resolution.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Cannot determine system data directory")]
    NoDataDir,

    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Root directory for settings and bookmarks.
///
/// An explicit override wins; otherwise the system data directory
/// (e.g. `~/.local/share/narrator`). The directory is created if missing.
pub fn data_root(dir_override: Option<&Path>) -> Result<PathBuf, PathError> {
    let root = match dir_override {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_local_dir()
            .ok_or(PathError::NoDataDir)?
            .join("narrator"),
    };

    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| PathError::CreateFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(root)
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join("settings.json")
}

pub fn bookmarks_path(root: &Path) -> PathBuf {
    root.join("bookmarks.json")
}
