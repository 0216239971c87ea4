//! Pass 1: inventory builder
//!
//! Walks every search root through its adapter, filters by extension and
//! year, and deduplicates by [`FileKey`].
//!
//! # Design
//!
//! - Roots are listed concurrently (one task per root) but merged strictly in
//!   configured order, so "first occurrence wins" refers to root order, never
//!   to which task finished first
//! - Each root task consumes its adapter's events through a bounded channel
//! - An unreachable root becomes a [`RootWarning`]; the pass continues

use crate::config::AppConfig;
use crate::error::{DossierError, Result};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::source::{AdapterRegistry, FileHandle, ListEvent, ListFilter, ListSummary};
use crate::types::{FileKey, FileRecord, ScanError, SkipReason, SkippedFile};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Listing events buffered per root before the walk blocks.
const LIST_CHANNEL_CAPACITY: usize = 256;

/// Filters applied to every listed file.
#[derive(Debug, Clone, Default)]
pub struct InventoryOptions {
    /// Normalized extensions (lowercase, no dot)
    pub include_extensions: BTreeSet<String>,
    /// Keep only files modified in one of these years
    pub years: Option<BTreeSet<i32>>,
    pub list_filter: ListFilter,
}

impl InventoryOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            include_extensions: config.include_extensions(),
            years: config.years.clone(),
            list_filter: ListFilter {
                exclude_dir_names: config.ignored_directories.clone(),
                include_hidden: config.include_hidden,
                follow_symlinks: config.follow_symlinks,
            },
        }
    }

    fn skip_reason(&self, record: &FileRecord) -> Option<SkipReason> {
        if !self.include_extensions.contains(&record.extension) {
            return Some(SkipReason::ExcludedExtension);
        }
        match &self.years {
            Some(years) if !years.contains(&record.year()) => Some(SkipReason::YearFiltered),
            _ => None,
        }
    }
}

/// One inventoried file.
#[derive(Debug, Clone)]
pub struct InventoryEntry {
    /// Stub record (no text yet)
    pub record: FileRecord,
    pub handle: FileHandle,
    /// Search root the file was first reached through
    pub root: String,
}

/// A search root that could not be walked.
#[derive(Debug, Clone)]
pub struct RootWarning {
    pub root: String,
    pub reason: String,
}

impl RootWarning {
    pub fn to_error(&self) -> DossierError {
        DossierError::SourceUnavailable {
            root: self.root.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Output of pass 1.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    /// Deduplicated files in root order, then walk order
    pub entries: Vec<InventoryEntry>,
    pub skipped: Vec<SkippedFile>,
    pub total_bytes: u64,
    pub warnings: Vec<RootWarning>,
    /// Files listed by adapters before filtering
    pub files_seen: u64,
    /// Entries that could not be read during walks
    pub scan_errors: Vec<ScanError>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn duplicates(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::Duplicate { .. }))
            .count()
    }
}

/// Everything one root task produced.
struct RootListing {
    accepted: Vec<(FileRecord, FileHandle)>,
    skipped: Vec<SkippedFile>,
    errors: Vec<ScanError>,
    seen: u64,
    result: std::result::Result<ListSummary, String>,
}

pub struct InventoryBuilder {
    registry: AdapterRegistry,
    options: Arc<InventoryOptions>,
}

impl InventoryBuilder {
    pub fn new(registry: AdapterRegistry, options: InventoryOptions) -> Self {
        Self {
            registry,
            options: Arc::new(options),
        }
    }

    /// Walk `roots` and build the deduplicated inventory.
    pub async fn build(&self, roots: &[String], progress: &dyn ProgressSink) -> Result<Inventory> {
        if roots.is_empty() {
            return Err(DossierError::NoSearchRoots);
        }
        let start = Instant::now();
        info!(roots = roots.len(), "Starting inventory");

        let mut inventory = Inventory::default();
        let mut listings: Vec<Option<RootListing>> = (0..roots.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, root) in roots.iter().enumerate() {
            let Some((adapter, adapter_root)) = self.registry.resolve(root) else {
                warn!(root = %root, "No source adapter for root");
                listings[index] = Some(RootListing::unreachable("no source adapter for this root"));
                continue;
            };

            let options = Arc::clone(&self.options);
            let root = root.clone();
            tasks.spawn(async move {
                let (tx, mut rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);
                let walk = adapter.list(&adapter_root, &options.list_filter, tx);
                let collect = async {
                    let mut listing = RootListing::empty();
                    while let Some(event) = rx.recv().await {
                        listing.push(event, &root, &options);
                    }
                    listing
                };
                let (result, mut listing) = tokio::join!(walk, collect);
                listing.result = result.map_err(|e| e.to_string());
                (index, listing)
            });
        }

        let mut completed = listings.iter().filter(|l| l.is_some()).count();
        while let Some(joined) = tasks.join_next().await {
            let (index, listing) = joined
                .map_err(|e| DossierError::InvalidState(format!("inventory task failed: {e}")))?;
            completed += 1;
            for (record, _) in &listing.accepted {
                progress.emit(ProgressEvent::of(
                    Phase::Inventory,
                    completed,
                    roots.len(),
                    Some(record.display_path.clone()),
                ));
            }
            listings[index] = Some(listing);
        }

        let mut first_root: HashMap<FileKey, usize> = HashMap::new();
        for (index, listing) in listings.into_iter().enumerate() {
            let root = &roots[index];
            let Some(listing) = listing else {
                continue;
            };
            inventory.files_seen += listing.seen;
            inventory.skipped.extend(listing.skipped);

            for error in &listing.errors {
                warn!(root = %root, path = %error.path, error = %error.message, "Skipping unreadable entry");
            }
            inventory.scan_errors.extend(listing.errors);

            match listing.result {
                Ok(summary) => {
                    debug!(
                        root = %root,
                        files = summary.files,
                        dirs = summary.dirs,
                        dirs_skipped = summary.dirs_skipped,
                        "Root listed"
                    );
                }
                Err(reason) => {
                    warn!(root = %root, reason = %reason, "Source unavailable");
                    inventory.warnings.push(RootWarning {
                        root: root.clone(),
                        reason,
                    });
                }
            }

            for (record, handle) in listing.accepted {
                if let Some(&first) = first_root.get(&record.key) {
                    debug!(key = %record.key, root = %root, "Dropping duplicate");
                    inventory.skipped.push(SkippedFile {
                        key: record.key,
                        root: root.clone(),
                        reason: SkipReason::Duplicate {
                            first_root: roots[first].clone(),
                        },
                    });
                    continue;
                }
                first_root.insert(record.key.clone(), index);
                inventory.total_bytes += record.size;
                inventory.entries.push(InventoryEntry {
                    record,
                    handle,
                    root: root.clone(),
                });
            }
        }

        info!(
            files = inventory.len(),
            bytes = inventory.total_bytes,
            seen = inventory.files_seen,
            duplicates = inventory.duplicates(),
            unavailable_roots = inventory.warnings.len(),
            errors = inventory.scan_errors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Inventory complete"
        );
        Ok(inventory)
    }
}

impl RootListing {
    fn empty() -> Self {
        Self {
            accepted: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            seen: 0,
            result: Ok(ListSummary::default()),
        }
    }

    fn unreachable(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            ..Self::empty()
        }
    }

    fn push(&mut self, event: ListEvent, root: &str, options: &InventoryOptions) {
        match event {
            ListEvent::File(handle) => {
                self.seen += 1;
                let record = handle.stub();
                match options.skip_reason(&record) {
                    Some(reason) => self.skipped.push(SkippedFile {
                        key: record.key,
                        root: root.to_string(),
                        reason,
                    }),
                    None => self.accepted.push((record, handle)),
                }
            }
            ListEvent::Error(error) => self.errors.push(error),
        }
    }
}
