//! Local filesystem adapter
//!
//! Walks with `ignore::WalkBuilder` (sorted, single-threaded so the walk
//! order is stable) and prunes excluded directories in `filter_entry`, so
//! they are never descended into.

use super::{FileHandle, ListEvent, ListFilter, ListSummary, SourceAdapter};
use crate::error::SourceError;
use crate::progress::TransferProgress;
use crate::scan_path::{canonicalize_scan_path, normalize_path_to_forward_slashes, validate_scan_path, ScanPathError};
use crate::types::{FileKey, FileRecord, ScanError, SourceId, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::debug;

pub const LOCAL_SOURCE_ID: &str = "local";

pub struct LocalAdapter {
    source_id: SourceId,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self {
            source_id: Arc::from(LOCAL_SOURCE_ID),
        }
    }

    fn handle_for(&self, path: &Path, metadata: &Metadata) -> FileHandle {
        let canonical = canonicalize_scan_path(path);
        let id = normalize_path_to_forward_slashes(&canonical);
        FileHandle {
            key: FileKey::new(self.source_id.clone(), id.clone()),
            locator: canonical.to_string_lossy().into_owned(),
            display_path: id,
            size: metadata.len(),
            modified: modified_of(metadata),
            extension: None,
            mime_type: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Handle for a single file outside any walk (e.g. `dossier classify`).
    pub fn handle_for_file(&self, path: &Path) -> Result<FileHandle, SourceError> {
        let display = path.display().to_string();
        let metadata = std::fs::metadata(path).map_err(|e| map_io_error(&display, e))?;
        if !metadata.is_file() {
            return Err(SourceError::NotAvailable(format!("{display}: not a file")));
        }
        Ok(self.handle_for(path, &metadata))
    }

    /// Blocking walk; runs on the blocking pool.
    fn walk(
        &self,
        root: &Path,
        filter: &ListFilter,
        tx: &mpsc::Sender<ListEvent>,
    ) -> ListSummary {
        let dirs_skipped = Arc::new(AtomicU64::new(0));
        let dirs_skipped_for_filter = dirs_skipped.clone();
        let exclude_dir_names: Arc<[String]> = Arc::from(filter.exclude_dir_names.clone());
        let include_hidden = filter.include_hidden;

        let walker = WalkBuilder::new(root)
            .hidden(!include_hidden)
            .follow_links(filter.follow_symlinks)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                // Only directories are pruned here; files are filtered later.
                if !entry.file_type().map_or(false, |ft| ft.is_dir()) {
                    return true;
                }
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                if exclude_dir_names.iter().any(|excluded| *excluded == *name) {
                    dirs_skipped_for_filter.fetch_add(1, Ordering::Relaxed);
                    debug!(path = %entry.path().display(), "Skipping excluded directory");
                    return false;
                }
                true
            })
            .build();

        let mut summary = ListSummary::default();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    summary.errors += 1;
                    let event = ListEvent::Error(ScanError {
                        path: error_path(&e).unwrap_or_else(|| root.display().to_string()),
                        message: e.to_string(),
                    });
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                    continue;
                }
            };

            let is_dir = entry.file_type().map_or(false, |ft| ft.is_dir());
            if is_dir {
                if entry.depth() > 0 {
                    summary.dirs += 1;
                }
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    summary.errors += 1;
                    let event = ListEvent::Error(ScanError {
                        path: entry.path().display().to_string(),
                        message: e.to_string(),
                    });
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            summary.files += 1;
            let handle = self.handle_for(entry.path(), &metadata);
            if tx.blocking_send(ListEvent::File(handle)).is_err() {
                // Receiver dropped: the consumer stopped listening.
                break;
            }
        }

        summary.dirs_skipped = dirs_skipped.load(Ordering::Relaxed);
        summary
    }
}

impl Default for LocalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for LocalAdapter {
    fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn list(
        &self,
        root: &str,
        filter: &ListFilter,
        tx: mpsc::Sender<ListEvent>,
    ) -> Result<ListSummary, SourceError> {
        let root_path = PathBuf::from(root);
        validate_scan_path(&root_path).map_err(|e| match e {
            ScanPathError::NotFound(_) => SourceError::NotFound(e.to_string()),
            _ => SourceError::NotAvailable(e.to_string()),
        })?;

        let adapter = Self {
            source_id: self.source_id.clone(),
        };
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || adapter.walk(&root_path, &filter, &tx))
            .await
            .map_err(|e| SourceError::NotAvailable(format!("walk task failed: {e}")))
    }

    async fn read_metadata(&self, handle: &FileHandle) -> Result<FileRecord, SourceError> {
        let metadata = tokio::fs::metadata(&handle.locator)
            .await
            .map_err(|e| map_io_error(&handle.locator, e))?;
        let mut record = handle.stub();
        record.size = metadata.len();
        record.modified = modified_of(&metadata);
        Ok(record)
    }

    async fn read_content(
        &self,
        handle: &FileHandle,
        _progress: &TransferProgress,
    ) -> Result<Vec<u8>, SourceError> {
        tokio::fs::read(&handle.locator)
            .await
            .map_err(|e| map_io_error(&handle.locator, e))
    }
}

fn modified_of(metadata: &Metadata) -> DateTime<Utc> {
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    DateTime::<Utc>::from(modified)
}

fn map_io_error(path: &str, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
        io::ErrorKind::PermissionDenied => {
            SourceError::NotAvailable(format!("{path}: permission denied"))
        }
        _ => SourceError::Io(err),
    }
}

fn error_path(err: &ignore::Error) -> Option<String> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.display().to_string()),
        ignore::Error::WithDepth { err, .. } => error_path(err),
        ignore::Error::WithLineNumber { err, .. } => error_path(err),
        ignore::Error::Loop { child, .. } => Some(child.display().to_string()),
        _ => None,
    }
}
