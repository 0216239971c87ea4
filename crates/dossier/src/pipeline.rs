//! Three-pass pipeline
//!
//! Pass 1 builds the inventory; pass 2 fetches, extracts, classifies and
//! estimates every file on a bounded worker pool; pass 3 assembles the
//! report in inventory order.
//!
//! # Concurrency
//!
//! - One global semaphore caps in-flight files; remote fetches also hold a
//!   permit from a smaller remote semaphore
//! - Results land in a pre-sized, index-addressed vector, so completion order
//!   never leaks into the report
//! - The rule table and the previous cache are shared read-only; the next
//!   cache is built on the side and handed back to the caller
//! - Cancellation is checked before each dispatch; in-flight files finish

use crate::cache::{CacheEntry, InventoryCache};
use crate::classify::{Classifier, RuleTable};
use crate::config::AppConfig;
use crate::effort::{EffortConfig, EffortEstimator};
use crate::error::{DossierError, Result};
use crate::extractor::{ExtractionError, ExtractorRegistry};
use crate::inventory::{Inventory, InventoryBuilder, InventoryEntry, InventoryOptions};
use crate::progress::{Phase, ProgressEvent, ProgressSink, TransferProgress};
use crate::report::{FileOutcome, Report, ReportAssembler};
use crate::source::{AdapterRegistry, FileHandle, SourceAdapter};
use crate::types::{ExtractionStatus, SourceKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Run-wide knobs, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_concurrency: usize,
    pub remote_concurrency: usize,
    pub text_scan_limit: Option<usize>,
    /// Reuse cached text for unchanged files
    pub use_cache: bool,
    pub include_text_snippets: bool,
    /// Run-level attributes (e.g. `author`) attached to every record.
    /// Per-file metadata with the same key wins.
    pub metadata: BTreeMap<String, String>,
    pub inventory: InventoryOptions,
    pub effort: EffortConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency.max(1),
            remote_concurrency: config.remote_concurrency.max(1),
            text_scan_limit: config.text_scan_limit,
            use_cache: true,
            include_text_snippets: config.include_text_snippets(),
            metadata: config.metadata.clone(),
            inventory: InventoryOptions::from_config(config),
            effort: config.effort.clone(),
        }
    }
}

/// Counters for one pass 2 run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub dispatched: usize,
    pub extracted: usize,
    pub cached: usize,
    pub degraded: usize,
    /// Workers that panicked; their files are reported as not scanned
    pub failed: usize,
}

/// Output of pass 2.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// Addressed by inventory index; `None` = not scanned
    pub outcomes: Vec<Option<FileOutcome>>,
    pub cancelled: bool,
    pub next_cache: InventoryCache,
    pub stats: AnalysisStats,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub inventory: Inventory,
    pub report: Report,
    pub stats: AnalysisStats,
    /// Cache to persist; only meaningful when the report is not partial
    pub next_cache: InventoryCache,
}

/// Read-only state shared by every pass 2 worker.
struct AnalysisContext {
    classifier: Classifier,
    extractors: ExtractorRegistry,
    cache: InventoryCache,
    estimator: EffortEstimator,
    text_scan_limit: Option<usize>,
    use_cache: bool,
    metadata: BTreeMap<String, String>,
}

/// What one worker hands back.
struct FileResult {
    index: usize,
    outcome: FileOutcome,
    cache_entry: Option<CacheEntry>,
    transfer: Option<(u64, u64)>,
}

pub struct Pipeline {
    config: PipelineConfig,
    registry: AdapterRegistry,
    context: Arc<AnalysisContext>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        registry: AdapterRegistry,
        rules: Arc<RuleTable>,
        extractors: ExtractorRegistry,
        cache: InventoryCache,
    ) -> Result<Self> {
        if rules.is_empty() {
            return Err(DossierError::Config("rule table has no rules".to_string()));
        }
        config.effort.validate()?;

        let context = Arc::new(AnalysisContext {
            classifier: Classifier::new(rules),
            extractors,
            cache,
            estimator: EffortEstimator::new(config.effort.clone()),
            text_scan_limit: config.text_scan_limit.filter(|&limit| limit > 0),
            use_cache: config.use_cache,
            metadata: config.metadata.clone(),
        });
        Ok(Self {
            config,
            registry,
            context,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// All three passes. Zero roots is fatal before anything is listed.
    pub async fn run(
        &self,
        roots: &[String],
        progress: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        if roots.is_empty() {
            return Err(DossierError::NoSearchRoots);
        }

        let inventory = self.pass_one(roots, progress).await?;
        let analysis = self.pass_two(&inventory, progress, cancel).await?;

        let report = ReportAssembler::new(self.config.include_text_snippets)
            .assemble(&inventory, analysis.outcomes)?;
        progress.emit(ProgressEvent::new(Phase::Report, 1.0, None));

        for (destination, count) in report.destination_totals() {
            info!(destination = %destination, files = count, "Destination total");
        }
        if report.partial {
            warn!(
                not_scanned = report.summary.not_scanned,
                "Run incomplete, report is partial"
            );
        }

        Ok(RunOutcome {
            inventory,
            report,
            stats: analysis.stats,
            next_cache: analysis.next_cache,
        })
    }

    /// Pass 2 for a single file, outside any run. The cache is consulted but
    /// not updated.
    pub async fn analyze(&self, handle: FileHandle) -> Result<FileOutcome> {
        let adapter = self.registry.get(&handle.key.source_id);
        let entry = InventoryEntry {
            record: handle.stub(),
            root: handle.display_path.clone(),
            handle,
        };
        // One file, nothing to share the worker pool with.
        let result = analyze_file(Arc::clone(&self.context), adapter, None, 0, entry, None).await;
        Ok(result.outcome)
    }

    /// Pass 1: list, filter and deduplicate.
    pub async fn pass_one(&self, roots: &[String], progress: &dyn ProgressSink) -> Result<Inventory> {
        InventoryBuilder::new(self.registry.clone(), self.config.inventory.clone())
            .build(roots, progress)
            .await
    }

    /// Pass 2: fetch, extract, classify and estimate every inventoried file.
    pub async fn pass_two(
        &self,
        inventory: &Inventory,
        progress: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let start = Instant::now();
        let total = inventory.len();
        let global = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let remote = Arc::new(Semaphore::new(self.config.remote_concurrency.max(1)));

        let mut state = AnalysisState::new(total);
        let mut tasks: JoinSet<FileResult> = JoinSet::new();
        let mut cancelled = false;

        for (index, entry) in inventory.entries.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&global).acquire_owned() => permit
                    .map_err(|_| DossierError::InvalidState("worker pool closed".to_string()))?,
            };

            let adapter = self.registry.get(&entry.record.key.source_id);
            let remote_gate = match adapter.as_ref().map(|a| a.kind()) {
                Some(SourceKind::Remote) => Some(Arc::clone(&remote)),
                _ => None,
            };
            tasks.spawn(analyze_file(
                Arc::clone(&self.context),
                adapter,
                remote_gate,
                index,
                entry.clone(),
                Some(permit),
            ));
            state.stats.dispatched += 1;

            while let Some(joined) = tasks.try_join_next() {
                state.record(joined, progress);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            state.record(joined, progress);
        }

        if cancelled {
            info!(
                dispatched = state.stats.dispatched,
                total,
                "Analysis cancelled, remaining files not scanned"
            );
        }
        // Unchanged entries for files this run never reached stay valid.
        for (entry, outcome) in inventory.entries.iter().zip(&state.outcomes) {
            if outcome.is_none() {
                if let Some(cached) = self.context.cache.lookup(&entry.record.key, entry.record.modified) {
                    state.next_cache.insert(entry.record.key.clone(), cached.clone());
                }
            }
        }

        info!(
            files = total,
            extracted = state.stats.extracted,
            cached = state.stats.cached,
            degraded = state.stats.degraded,
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(AnalysisOutcome {
            outcomes: state.outcomes,
            cancelled,
            next_cache: state.next_cache,
            stats: state.stats,
        })
    }
}

/// Mutable pass 2 bookkeeping, owned by the dispatching task only.
struct AnalysisState {
    outcomes: Vec<Option<FileOutcome>>,
    next_cache: InventoryCache,
    stats: AnalysisStats,
    completed: usize,
    total: usize,
}

impl AnalysisState {
    fn new(total: usize) -> Self {
        Self {
            outcomes: (0..total).map(|_| None).collect(),
            next_cache: InventoryCache::new(),
            stats: AnalysisStats::default(),
            completed: 0,
            total,
        }
    }

    fn record(&mut self, joined: std::result::Result<FileResult, JoinError>, progress: &dyn ProgressSink) {
        self.completed += 1;
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Analysis worker failed");
                self.stats.failed += 1;
                progress.emit(ProgressEvent::of(Phase::Analysis, self.completed, self.total, None));
                return;
            }
        };

        match &result.outcome.record.extraction {
            ExtractionStatus::Cached => self.stats.cached += 1,
            ExtractionStatus::Degraded { .. } => self.stats.degraded += 1,
            _ => self.stats.extracted += 1,
        }
        if let Some(entry) = result.cache_entry {
            self.next_cache.insert(result.outcome.record.key.clone(), entry);
        }
        progress.emit(
            ProgressEvent::of(
                Phase::Analysis,
                self.completed,
                self.total,
                Some(result.outcome.record.display_path.clone()),
            )
            .with_transfer(result.transfer),
        );
        if let Some(slot) = self.outcomes.get_mut(result.index) {
            *slot = Some(result.outcome);
        }
    }
}

/// One file through fetch, extract, classify and estimate.
///
/// Never fails: every problem degrades the record instead.
async fn analyze_file(
    ctx: Arc<AnalysisContext>,
    adapter: Option<Arc<dyn SourceAdapter>>,
    remote_gate: Option<Arc<Semaphore>>,
    index: usize,
    entry: InventoryEntry,
    _permit: Option<OwnedSemaphorePermit>,
) -> FileResult {
    let InventoryEntry { mut record, handle, .. } = entry;
    let transfer = TransferProgress::new();
    let mut cache_entry = None;

    match adapter {
        None => {
            record.extraction = ExtractionStatus::degraded(format!(
                "no adapter for source {}",
                record.key.source_id
            ));
        }
        Some(adapter) => {
            match adapter.read_metadata(&handle).await {
                Ok(fresh) => {
                    record.size = fresh.size;
                    record.modified = fresh.modified;
                }
                Err(e) => debug!(path = %record.display_path, error = %e, "Metadata refresh failed"),
            }

            let cached = ctx
                .use_cache
                .then(|| ctx.cache.lookup(&record.key, record.modified))
                .flatten();
            if let Some(cached) = cached {
                record.text = Some(cached.text.clone());
                record.checksum = cached.checksum.clone();
                record.extraction = ExtractionStatus::Cached;
                cache_entry = Some(cached.clone());
            } else if !ctx.extractors.supports(&record.extension) {
                // No point fetching bytes nobody can read.
                record.extraction =
                    ExtractionStatus::degraded(ExtractionError::Unsupported(record.extension.clone()).to_string());
            } else {
                let fetched = {
                    let _remote_permit = match &remote_gate {
                        Some(gate) => Arc::clone(gate).acquire_owned().await.ok(),
                        None => None,
                    };
                    adapter.read_content(&handle, &transfer).await
                };
                match fetched {
                    Ok(bytes) => {
                        record.checksum = Some(blake3::hash(&bytes).to_hex().to_string());
                        match extract(&ctx, &record.extension, bytes).await {
                            Ok(text) => {
                                record.text = Some(text.clone());
                                record.extraction = ExtractionStatus::Extracted;
                                cache_entry = Some(CacheEntry {
                                    modified: record.modified,
                                    text,
                                    checksum: record.checksum.clone(),
                                });
                            }
                            Err(e) => record.extraction = ExtractionStatus::degraded(e.to_string()),
                        }
                    }
                    Err(e) => {
                        record.extraction =
                            ExtractionStatus::degraded(ExtractionError::Source(e.to_string()).to_string());
                    }
                }
            }
        }
    }

    if let ExtractionStatus::Degraded { reason } = &record.extraction {
        warn!(path = %record.display_path, reason = %reason, "Extraction degraded");
    }
    for (key, value) in &ctx.metadata {
        record.metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }

    let classification = ctx.classifier.classify_record(&record, ctx.text_scan_limit);
    let effort = ctx.estimator.estimate(&record, &classification);
    FileResult {
        index,
        outcome: FileOutcome {
            record,
            classification,
            effort,
        },
        cache_entry,
        transfer: transfer.snapshot(),
    }
}

/// Extraction is CPU-bound (PDF especially), so it runs off the runtime.
async fn extract(ctx: &Arc<AnalysisContext>, extension: &str, bytes: Vec<u8>) -> std::result::Result<String, ExtractionError> {
    let ctx = Arc::clone(ctx);
    let extension = extension.to_string();
    tokio::task::spawn_blocking(move || ctx.extractors.extract(&extension, &bytes))
        .await
        .unwrap_or_else(|e| Err(ExtractionError::Source(format!("extraction task failed: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use crate::report::ScanStatus;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> PipelineConfig {
        let mut app = AppConfig::default();
        app.search_roots = vec![dir.path().to_string_lossy().into_owned()];
        app.max_concurrency = 2;
        PipelineConfig::from_app_config(&app)
    }

    fn pipeline(config: PipelineConfig, cache: InventoryCache) -> Pipeline {
        Pipeline::new(
            config,
            AdapterRegistry::with_local(),
            Arc::new(RuleTable::builtin()),
            ExtractorRegistry::with_defaults(),
            cache,
        )
        .unwrap()
    }

    fn roots(dir: &TempDir) -> Vec<String> {
        vec![dir.path().to_string_lossy().into_owned()]
    }

    #[tokio::test]
    async fn test_run_classifies_in_inventory_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_concert_program.txt"), "Spring concert").unwrap();
        fs::write(dir.path().join("b_notes.txt"), "nothing relevant").unwrap();
        fs::write(dir.path().join("c_drill.musx"), [0u8, 1, 2]).unwrap();

        let run = pipeline(config(&dir), InventoryCache::new())
            .run(&roots(&dir), &NullProgress, CancellationToken::new())
            .await
            .unwrap();

        let report = &run.report;
        assert!(!report.partial);
        let categories: Vec<&str> = report.records.iter().map(|r| r.primary_category.as_str()).collect();
        assert_eq!(categories, vec!["Teaching", "Unclassified", "Scholarly / Creative"]);
        assert!(report.records[2].extraction_degraded);
        assert_eq!(run.stats.degraded, 1);
        assert_eq!(run.stats.extracted, 2);
        // Degraded extraction is not cached.
        assert_eq!(run.next_cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_extraction() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("advising.txt"), "advisee list").unwrap();

        let first = pipeline(config(&dir), InventoryCache::new())
            .run(&roots(&dir), &NullProgress, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.stats.extracted, 1);

        let second = pipeline(config(&dir), first.next_cache.clone())
            .run(&roots(&dir), &NullProgress, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.stats.cached, 1);
        assert_eq!(second.stats.extracted, 0);
        assert_eq!(first.report.records, second.report.records);

        let mut no_cache = config(&dir);
        no_cache.use_cache = false;
        let third = pipeline(no_cache, first.next_cache)
            .run(&roots(&dir), &NullProgress, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(third.stats.extracted, 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_partial() {
        let dir = TempDir::new().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("f{i}.txt")), "text").unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        let run = pipeline(config(&dir), InventoryCache::new())
            .run(&roots(&dir), &NullProgress, cancel)
            .await
            .unwrap();
        assert_eq!(run.inventory.len(), 5);
        assert!(run.report.partial);
        assert_eq!(run.report.records.len(), 5);
        assert!(run.report.records.iter().all(|r| r.status == ScanStatus::NotScanned));
        assert_eq!(run.stats.dispatched, 0);
    }

    #[tokio::test]
    async fn test_zero_roots_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = pipeline(config(&dir), InventoryCache::new())
            .run(&[], &NullProgress, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DossierError::NoSearchRoots)));
    }

    #[tokio::test]
    async fn test_run_metadata_attached_without_overriding() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let mut config = config(&dir);
        config.metadata.insert("author".to_string(), "J. Doe".to_string());

        let pipeline = pipeline(config, InventoryCache::new());
        let inventory = pipeline.pass_one(&roots(&dir), &NullProgress).await.unwrap();
        let analysis = pipeline
            .pass_two(&inventory, &NullProgress, CancellationToken::new())
            .await
            .unwrap();
        let record = &analysis.outcomes[0].as_ref().unwrap().record;
        assert_eq!(record.metadata.get("author").map(String::as_str), Some("J. Doe"));
        assert!(!analysis.cancelled);
    }

    #[tokio::test]
    async fn test_analyze_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Annual_Evaluation.txt");
        fs::write(&path, "HoursSpent: 3").unwrap();
        let handle = crate::source::LocalAdapter::new().handle_for_file(&path).unwrap();

        let outcome = pipeline(config(&dir), InventoryCache::new())
            .analyze(handle)
            .await
            .unwrap();
        assert_eq!(outcome.classification.primary.as_str(), "Form");
        assert_eq!(outcome.effort.hours, 3.0);
        assert_eq!(outcome.record.extraction, ExtractionStatus::Extracted);
    }

    #[tokio::test]
    async fn test_analysis_progress_per_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        let events = Mutex::new(Vec::new());
        let sink = crate::progress::FnProgress(|event: ProgressEvent| {
            events.lock().unwrap().push(event);
        });

        pipeline(config(&dir), InventoryCache::new())
            .run(&roots(&dir), &sink, CancellationToken::new())
            .await
            .unwrap();

        let events = events.into_inner().unwrap();
        let analysis: Vec<&ProgressEvent> = events.iter().filter(|e| e.phase == Phase::Analysis).collect();
        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis.last().map(|e| e.fraction), Some(1.0));
        assert_eq!(events.last().map(|e| e.phase), Some(Phase::Report));
    }
}
