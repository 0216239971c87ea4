//! Source adapters
//!
//! Every storage backend (local disk, cloud drives) exposes the same three
//! operations. The engine never branches on the backend beyond
//! [`SourceKind`], which only decides concurrency limits and tagging.

pub mod local;
pub mod remote;

use crate::error::SourceError;
use crate::progress::TransferProgress;
use crate::types::{FileKey, FileRecord, ScanError, SourceId, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use local::LocalAdapter;
pub use remote::{DriveClient, DriveFile, DrivePage, RemoteAdapter};

/// Walk options every adapter honours.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Directory names pruned before descent
    pub exclude_dir_names: Vec<String>,
    pub include_hidden: bool,
    pub follow_symlinks: bool,
}

impl ListFilter {
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dir_names.iter().any(|excluded| excluded == name)
    }

    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }
}

/// Opaque reference to one listed file, enough to fetch it again.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub key: FileKey,
    /// Adapter-specific address (filesystem path, remote file id)
    pub locator: String,
    pub display_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Extension to use instead of the one in the name
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl FileHandle {
    /// FileRecord stub (no text) as seen at listing time.
    pub fn stub(&self) -> FileRecord {
        let mut record = FileRecord::new(
            self.key.source_id.clone(),
            self.key.id.clone(),
            self.display_path.clone(),
            self.size,
            self.modified,
        );
        if let Some(ext) = &self.extension {
            record = record.with_extension(ext);
        }
        record.metadata = self.metadata.clone();
        if let Some(mime) = &self.mime_type {
            record.metadata.insert("mime_type".to_string(), mime.clone());
        }
        record
    }
}

/// Items produced by a walk, in walk order.
#[derive(Debug)]
pub enum ListEvent {
    File(FileHandle),
    /// An entry that could not be read; the walk continues.
    Error(ScanError),
}

/// Totals for one completed walk.
#[derive(Debug, Clone, Default)]
pub struct ListSummary {
    pub files: u64,
    pub dirs: u64,
    pub dirs_skipped: u64,
    pub errors: u64,
}

/// Uniform listing/fetch contract over local and remote storage.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &SourceId;

    fn kind(&self) -> SourceKind;

    /// Walk `root`, sending every file through `tx`.
    ///
    /// Finite and restartable: calling again walks again. An `Err` means
    /// the root itself is unreachable; per-entry problems are sent as
    /// [`ListEvent::Error`].
    async fn list(
        &self,
        root: &str,
        filter: &ListFilter,
        tx: mpsc::Sender<ListEvent>,
    ) -> Result<ListSummary, SourceError>;

    /// Fresh metadata for a previously listed file.
    async fn read_metadata(&self, handle: &FileHandle) -> Result<FileRecord, SourceError>;

    /// Full content. Remote adapters report byte counts through `progress`.
    async fn read_content(
        &self,
        handle: &FileHandle,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, SourceError>;
}

/// Adapters available to a run, keyed by source id.
///
/// A root like `drive:work/<folder>` is routed to the adapter whose id is
/// `drive:work`. A qualifier is only recognised when some registered adapter
/// uses its scheme (`drive`); everything else is a local path, so a folder
/// named `notes:2024` stays local.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    local: Option<Arc<dyn SourceAdapter>>,
    qualified: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with only the local filesystem adapter.
    pub fn with_local() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LocalAdapter::new()));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        match adapter.kind() {
            SourceKind::Local => self.local = Some(adapter),
            SourceKind::Remote => {
                self.qualified
                    .retain(|existing| existing.source_id() != adapter.source_id());
                self.qualified.push(adapter);
            }
        }
    }

    /// Split a root string into its adapter and adapter-relative root.
    pub fn resolve(&self, root: &str) -> Option<(Arc<dyn SourceAdapter>, String)> {
        let qualified = split_qualified_root(root).filter(|(qualifier, _)| self.has_scheme(qualifier));
        match qualified {
            Some((qualifier, rest)) => self
                .qualified
                .iter()
                .find(|adapter| adapter.source_id().as_ref() == qualifier)
                .map(|adapter| (Arc::clone(adapter), rest.to_string())),
            None => self
                .local
                .as_ref()
                .map(|adapter| (Arc::clone(adapter), root.to_string())),
        }
    }

    /// Whether a registered adapter shares the scheme of `qualifier`.
    fn has_scheme(&self, qualifier: &str) -> bool {
        let scheme = qualifier.split(':').next().unwrap_or(qualifier);
        self.qualified.iter().any(|adapter| {
            adapter
                .source_id()
                .split_once(':')
                .map_or(false, |(registered, _)| registered == scheme)
        })
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.local
            .iter()
            .chain(self.qualified.iter())
            .find(|adapter| adapter.source_id().as_ref() == source_id)
            .cloned()
    }

    pub fn kind_of(&self, source_id: &str) -> Option<SourceKind> {
        self.get(source_id).map(|adapter| adapter.kind())
    }
}

/// `scheme:account/rest` → (`scheme:account`, `rest`). Windows drive letters
/// (`C:\..`) and plain paths are not qualified.
fn split_qualified_root(root: &str) -> Option<(&str, &str)> {
    let colon = root.find(':')?;
    let scheme = &root[..colon];
    if scheme.len() < 2 || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return None;
    }
    match root[colon + 1..].find('/') {
        Some(slash) => {
            let split = colon + 1 + slash;
            Some((&root[..split], &root[split + 1..]))
        }
        None => Some((root, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::remote::tests::FakeDrive;

    #[test]
    fn test_split_qualified_root() {
        assert_eq!(split_qualified_root("drive:work/abc123"), Some(("drive:work", "abc123")));
        assert_eq!(split_qualified_root("drive:work"), Some(("drive:work", "")));
        assert_eq!(split_qualified_root("drive:work/a/b"), Some(("drive:work", "a/b")));
        assert_eq!(split_qualified_root("/home/me/Documents"), None);
        assert_eq!(split_qualified_root("C:\\Users\\me"), None);
        assert_eq!(split_qualified_root("relative/dir"), None);
    }

    #[test]
    fn test_registry_resolves_by_qualifier() {
        let mut registry = AdapterRegistry::with_local();
        registry.register(Arc::new(RemoteAdapter::new("drive:work", FakeDrive::default())));

        let (adapter, root) = registry.resolve("/data").unwrap();
        assert_eq!(adapter.kind(), SourceKind::Local);
        assert_eq!(root, "/data");

        let (adapter, root) = registry.resolve("drive:work/folder-1").unwrap();
        assert_eq!(adapter.source_id().as_ref(), "drive:work");
        assert_eq!(root, "folder-1");

        assert!(registry.resolve("drive:personal/folder-1").is_none());

        // Unknown schemes are ordinary relative paths.
        let (adapter, root) = registry.resolve("notes:2024/x").unwrap();
        assert_eq!(adapter.kind(), SourceKind::Local);
        assert_eq!(root, "notes:2024/x");
        assert_eq!(registry.kind_of("drive:work"), Some(SourceKind::Remote));
        assert_eq!(registry.kind_of("local"), Some(SourceKind::Local));
    }

    #[test]
    fn test_local_only_registry_treats_qualifiers_as_paths() {
        let registry = AdapterRegistry::with_local();
        let (adapter, root) = registry.resolve("drive:work/folder-1").unwrap();
        assert_eq!(adapter.kind(), SourceKind::Local);
        assert_eq!(root, "drive:work/folder-1");
    }

    #[test]
    fn test_stub_carries_metadata_and_extension() {
        let handle = FileHandle {
            key: FileKey::new(Arc::from("drive:work"), "id-1"),
            locator: "id-1".to_string(),
            display_path: "drive:work/Annual Evaluation".to_string(),
            size: 0,
            modified: Utc::now(),
            extension: Some("pdf".to_string()),
            mime_type: Some("application/vnd.google-apps.document".to_string()),
            metadata: BTreeMap::new(),
        };
        let stub = handle.stub();
        assert_eq!(stub.extension, "pdf");
        assert_eq!(stub.name, "Annual Evaluation");
        assert!(stub.metadata.contains_key("mime_type"));
        assert!(stub.text.is_none());
    }
}
