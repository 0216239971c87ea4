//! Search-root path helpers

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a local search root cannot be walked.
#[derive(Debug, Clone, Error)]
pub enum ScanPathError {
    #[error("search root does not exist: {}", .0.display())]
    NotFound(PathBuf),
    #[error("search root is not a folder: {}", .0.display())]
    NotDirectory(PathBuf),
    #[error("search root is not readable: {}", .0.display())]
    NotReadable(PathBuf),
}

/// Expand a leading `~` to the home directory.
pub fn expand_scan_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Resolve symlinks and `..`; a path that cannot be resolved is kept as given.
pub fn canonicalize_scan_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn validate_scan_path(path: &Path) -> Result<(), ScanPathError> {
    let owned = || path.to_path_buf();
    match std::fs::metadata(path) {
        Err(_) => Err(ScanPathError::NotFound(owned())),
        Ok(meta) if !meta.is_dir() => Err(ScanPathError::NotDirectory(owned())),
        Ok(_) => std::fs::read_dir(path)
            .map(|_| ())
            .map_err(|_| ScanPathError::NotReadable(owned())),
    }
}

/// Forward-slash form of a path, used for canonical ids on every platform.
pub fn normalize_path_to_forward_slashes(path: &Path) -> String {
    let parts: Vec<_> = path.components().map(|part| part.as_os_str().to_string_lossy()).collect();
    let joined = parts.join("/");
    // RootDir renders as "/" which would double up after the join.
    if joined.starts_with("//") {
        joined[1..].to_string()
    } else {
        joined
    }
}
