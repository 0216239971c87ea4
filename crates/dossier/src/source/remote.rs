//! Cloud-drive adapter
//!
//! Recursive, paged folder listing over a [`DriveClient`]. Authentication
//! and HTTP transport live entirely behind the client trait; this adapter
//! only knows the listing semantics:
//!
//! - trashed items are skipped
//! - folders are descended into (after the folder's own files)
//! - only supported document mime types are listed
//! - native drive documents are exported (docs/slides as PDF, sheets as XLSX)

use super::{FileHandle, ListEvent, ListFilter, ListSummary, SourceAdapter};
use crate::error::SourceError;
use crate::progress::TransferProgress;
use crate::types::{FileKey, FileRecord, ScanError, SourceId, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const NATIVE_DOCUMENT: &str = "application/vnd.google-apps.document";
const NATIVE_PRESENTATION: &str = "application/vnd.google-apps.presentation";
const NATIVE_SPREADSHEET: &str = "application/vnd.google-apps.spreadsheet";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Folder id used when a root names no folder.
pub const DRIVE_ROOT: &str = "root";

/// Supported mime types and the extension used when the name has none.
const SUPPORTED_MIME_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("application/vnd.openxmlformats-officedocument.wordprocessingml.document", "docx"),
    ("application/vnd.openxmlformats-officedocument.presentationml.presentation", "pptx"),
    (XLSX_MIME, "xlsx"),
    ("application/msword", "doc"),
    ("text/plain", "txt"),
    ("text/csv", "csv"),
    (NATIVE_DOCUMENT, "pdf"),
    (NATIVE_PRESENTATION, "pdf"),
    (NATIVE_SPREADSHEET, "xlsx"),
];

/// One item returned by a drive listing call.
#[derive(Debug, Clone)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub web_view_link: Option<String>,
    pub trashed: bool,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }

    pub fn is_supported_document(&self) -> bool {
        SUPPORTED_MIME_TYPES.iter().any(|(mime, _)| *mime == self.mime_type)
    }

    /// Format the content must be exported to, for native drive documents.
    pub fn export_mime(&self) -> Option<&'static str> {
        export_mime_for(&self.mime_type)
    }
}

fn export_mime_for(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        NATIVE_DOCUMENT | NATIVE_PRESENTATION => Some("application/pdf"),
        NATIVE_SPREADSHEET => Some(XLSX_MIME),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrivePage {
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

/// Transport to one authenticated drive account.
#[async_trait]
pub trait DriveClient: Send + Sync {
    /// Children of `folder_id`, one page at a time.
    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<DrivePage, SourceError>;

    /// Content of `file_id`, exported to `export_mime` when given.
    async fn download(
        &self,
        file_id: &str,
        export_mime: Option<&str>,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, SourceError>;
}

pub struct RemoteAdapter<C> {
    source_id: SourceId,
    client: C,
}

impl<C: DriveClient> RemoteAdapter<C> {
    /// `source_id` is the root qualifier, e.g. `drive:work`.
    pub fn new(source_id: &str, client: C) -> Self {
        Self {
            source_id: Arc::from(source_id),
            client,
        }
    }

    fn handle_for(&self, file: &DriveFile, folder_path: &str) -> FileHandle {
        let display_path = if folder_path.is_empty() {
            format!("{}/{}", self.source_id, file.name)
        } else {
            format!("{}/{}/{}", self.source_id, folder_path, file.name)
        };

        let name_has_extension = file
            .name
            .rfind('.')
            .map_or(false, |idx| idx > 0 && idx + 1 < file.name.len());
        let extension = if file.export_mime().is_some() || !name_has_extension {
            SUPPORTED_MIME_TYPES
                .iter()
                .find(|(mime, _)| *mime == file.mime_type)
                .map(|(_, ext)| ext.to_string())
        } else {
            None
        };

        let mut metadata = BTreeMap::new();
        if let Some(link) = &file.web_view_link {
            metadata.insert("web_view_link".to_string(), link.clone());
        }

        FileHandle {
            key: FileKey::new(self.source_id.clone(), file.id.clone()),
            locator: file.id.clone(),
            display_path,
            size: file.size,
            modified: file.modified,
            extension,
            mime_type: Some(file.mime_type.clone()),
            metadata,
        }
    }

    /// Every page of one folder.
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, SourceError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.client.list_page(folder_id, page_token.as_deref()).await?;
            items.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl<C: DriveClient> SourceAdapter for RemoteAdapter<C> {
    fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn list(
        &self,
        root: &str,
        filter: &ListFilter,
        tx: mpsc::Sender<ListEvent>,
    ) -> Result<ListSummary, SourceError> {
        let root_folder = match root.trim_matches('/') {
            "" => DRIVE_ROOT.to_string(),
            folder => folder.to_string(),
        };

        let mut summary = ListSummary::default();
        // (folder id, display path relative to the drive root)
        let mut stack: Vec<(String, String)> = vec![(root_folder.clone(), String::new())];
        // Folders can have several parents, so the folder graph may revisit or cycle.
        let mut visited: HashSet<String> = HashSet::from([root_folder.clone()]);

        while let Some((folder_id, folder_path)) = stack.pop() {
            let items = match self.list_folder(&folder_id).await {
                Ok(items) => items,
                Err(e) if folder_id == root_folder => return Err(e),
                Err(e) => {
                    warn!(source = %self.source_id, folder = %folder_path, error = %e, "Failed to list drive folder");
                    summary.errors += 1;
                    let event = ListEvent::Error(ScanError {
                        path: format!("{}/{}", self.source_id, folder_path),
                        message: e.to_string(),
                    });
                    if tx.send(event).await.is_err() {
                        return Ok(summary);
                    }
                    continue;
                }
            };

            let mut subfolders = Vec::new();
            for item in items {
                if item.trashed {
                    continue;
                }
                if !filter.include_hidden && ListFilter::is_hidden(&item.name) {
                    continue;
                }
                if item.is_folder() {
                    if filter.is_excluded_dir(&item.name) {
                        summary.dirs_skipped += 1;
                        debug!(source = %self.source_id, folder = %item.name, "Skipping excluded drive folder");
                        continue;
                    }
                    if !visited.insert(item.id.clone()) {
                        debug!(source = %self.source_id, folder = %item.name, id = %item.id, "Drive folder already walked");
                        continue;
                    }
                    summary.dirs += 1;
                    let child_path = if folder_path.is_empty() {
                        item.name.clone()
                    } else {
                        format!("{}/{}", folder_path, item.name)
                    };
                    subfolders.push((item.id.clone(), child_path));
                } else if item.is_supported_document() {
                    summary.files += 1;
                    let handle = self.handle_for(&item, &folder_path);
                    if tx.send(ListEvent::File(handle)).await.is_err() {
                        return Ok(summary);
                    }
                }
            }

            // Pop order must match listing order.
            stack.extend(subfolders.into_iter().rev());
        }

        Ok(summary)
    }

    async fn read_metadata(&self, handle: &FileHandle) -> Result<FileRecord, SourceError> {
        // Listing metadata is authoritative for remote files.
        Ok(handle.stub())
    }

    async fn read_content(
        &self,
        handle: &FileHandle,
        progress: &TransferProgress,
    ) -> Result<Vec<u8>, SourceError> {
        let export = handle.mime_type.as_deref().and_then(export_mime_for);
        self.client.download(&handle.locator, export, progress).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory drive: folder id → pages of children; file id → bytes.
    #[derive(Default)]
    pub(crate) struct FakeDrive {
        pub folders: HashMap<String, Vec<Vec<DriveFile>>>,
        pub contents: HashMap<String, Vec<u8>>,
        pub downloads: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeDrive {
        pub fn file(id: &str, name: &str, mime: &str) -> DriveFile {
            DriveFile {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: mime.to_string(),
                size: 100,
                modified: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
                web_view_link: Some(format!("https://drive.example/{id}")),
                trashed: false,
            }
        }

        pub fn folder(id: &str, name: &str) -> DriveFile {
            Self::file(id, name, FOLDER_MIME)
        }
    }

    #[async_trait]
    impl DriveClient for FakeDrive {
        async fn list_page(
            &self,
            folder_id: &str,
            page_token: Option<&str>,
        ) -> Result<DrivePage, SourceError> {
            let pages = self
                .folders
                .get(folder_id)
                .ok_or_else(|| SourceError::Remote(format!("no folder {folder_id}")))?;
            let index: usize = page_token.map(|t| t.parse().unwrap_or(0)).unwrap_or(0);
            let files = pages.get(index).cloned().unwrap_or_default();
            let next_page_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());
            Ok(DrivePage { files, next_page_token })
        }

        async fn download(
            &self,
            file_id: &str,
            export_mime: Option<&str>,
            progress: &TransferProgress,
        ) -> Result<Vec<u8>, SourceError> {
            self.downloads
                .lock()
                .unwrap()
                .push((file_id.to_string(), export_mime.map(str::to_string)));
            let bytes = self
                .contents
                .get(file_id)
                .cloned()
                .ok_or_else(|| SourceError::NotAvailable(format!("{file_id} offline")))?;
            progress.update(bytes.len() as u64, bytes.len() as u64);
            Ok(bytes)
        }
    }

    fn sample_drive() -> FakeDrive {
        let mut drive = FakeDrive::default();
        let mut trashed = FakeDrive::file("t1", "old.pdf", "application/pdf");
        trashed.trashed = true;
        drive.folders.insert(
            "top".to_string(),
            vec![
                vec![
                    FakeDrive::folder("f-teach", "Teaching"),
                    FakeDrive::file("p1", "syllabus.pdf", "application/pdf"),
                    trashed,
                ],
                vec![
                    FakeDrive::file("g1", "Annual Evaluation", NATIVE_DOCUMENT),
                    FakeDrive::file("img", "photo.png", "image/png"),
                    FakeDrive::folder("f-arch", "Archive"),
                ],
            ],
        );
        drive.folders.insert(
            "f-teach".to_string(),
            vec![vec![FakeDrive::file("s1", "grades", NATIVE_SPREADSHEET)]],
        );
        drive.folders.insert(
            "f-arch".to_string(),
            vec![vec![FakeDrive::file("a1", "ancient.pdf", "application/pdf")]],
        );
        drive
    }

    async fn collect(adapter: &RemoteAdapter<FakeDrive>, root: &str, filter: &ListFilter) -> Vec<FileHandle> {
        let (tx, mut rx) = mpsc::channel(64);
        let summary = adapter.list(root, filter, tx).await.unwrap();
        let mut handles = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ListEvent::File(handle) = event {
                handles.push(handle);
            }
        }
        assert_eq!(summary.files as usize, handles.len());
        handles
    }

    #[tokio::test]
    async fn test_recursive_paged_listing() {
        let adapter = RemoteAdapter::new("drive:work", sample_drive());
        let handles = collect(&adapter, "top", &ListFilter::default()).await;

        let paths: Vec<&str> = handles.iter().map(|h| h.display_path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "drive:work/syllabus.pdf",
                "drive:work/Annual Evaluation",
                "drive:work/Teaching/grades",
                "drive:work/Archive/ancient.pdf",
            ]
        );
        assert_eq!(handles[1].stub().extension, "pdf");
        assert_eq!(handles[2].stub().extension, "xlsx");
        assert_eq!(handles[0].stub().extension, "pdf");
    }

    #[tokio::test]
    async fn test_excluded_folder_is_not_listed() {
        let adapter = RemoteAdapter::new("drive:work", sample_drive());
        let filter = ListFilter {
            exclude_dir_names: vec!["Archive".to_string()],
            ..ListFilter::default()
        };
        let handles = collect(&adapter, "top", &filter).await;
        assert!(handles.iter().all(|h| !h.display_path.contains("Archive")));
        assert_eq!(handles.len(), 3);
    }

    #[tokio::test]
    async fn test_folder_cycle_terminates() {
        let mut drive = FakeDrive::default();
        drive.folders.insert(
            "top".to_string(),
            vec![vec![FakeDrive::folder("a", "A"), FakeDrive::file("p1", "cv.pdf", "application/pdf")]],
        );
        drive.folders.insert(
            "a".to_string(),
            vec![vec![FakeDrive::folder("top", "Back"), FakeDrive::file("p2", "talk.pdf", "application/pdf")]],
        );
        let adapter = RemoteAdapter::new("drive:work", drive);

        let handles = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            collect(&adapter, "top", &ListFilter::default()),
        )
        .await
        .unwrap();
        let paths: Vec<&str> = handles.iter().map(|h| h.display_path.as_str()).collect();
        assert_eq!(paths, vec!["drive:work/cv.pdf", "drive:work/A/talk.pdf"]);
    }

    #[tokio::test]
    async fn test_shared_folder_walked_once() {
        let mut drive = FakeDrive::default();
        drive.folders.insert(
            "top".to_string(),
            vec![vec![FakeDrive::folder("a", "A"), FakeDrive::folder("b", "B")]],
        );
        drive.folders.insert("a".to_string(), vec![vec![FakeDrive::folder("shared", "Shared")]]);
        drive.folders.insert("b".to_string(), vec![vec![FakeDrive::folder("shared", "Shared")]]);
        drive.folders.insert(
            "shared".to_string(),
            vec![vec![FakeDrive::file("cv", "cv.pdf", "application/pdf")]],
        );
        let adapter = RemoteAdapter::new("drive:work", drive);

        let (tx, mut rx) = mpsc::channel(64);
        let summary = adapter.list("top", &ListFilter::default(), tx).await.unwrap();
        let mut paths = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ListEvent::File(handle) = event {
                paths.push(handle.display_path);
            }
        }
        assert_eq!(paths, vec!["drive:work/A/Shared/cv.pdf".to_string()]);
        assert_eq!(summary.dirs, 3);
    }

    #[tokio::test]
    async fn test_unreachable_root_is_error() {
        let adapter = RemoteAdapter::new("drive:work", sample_drive());
        let (tx, _rx) = mpsc::channel(4);
        let result = adapter.list("missing", &ListFilter::default(), tx).await;
        assert!(matches!(result, Err(SourceError::Remote(_))));
    }

    #[tokio::test]
    async fn test_native_documents_are_exported() {
        let mut drive = sample_drive();
        drive.contents.insert("g1".to_string(), b"%PDF".to_vec());
        let adapter = RemoteAdapter::new("drive:work", drive);
        let handles = collect(&adapter, "top", &ListFilter::default()).await;

        let progress = TransferProgress::new();
        let bytes = adapter.read_content(&handles[1], &progress).await.unwrap();
        assert_eq!(bytes, b"%PDF");
        assert_eq!(progress.snapshot(), Some((4, 4)));

        let downloads = adapter.client.downloads.lock().unwrap().clone();
        assert_eq!(downloads, vec![("g1".to_string(), Some("application/pdf".to_string()))]);

        let err = adapter.read_content(&handles[0], &progress).await.unwrap_err();
        assert!(matches!(err, SourceError::NotAvailable(_)));
    }
}
