//! Dossier - Portfolio Document Discovery & Classification
//!
//! Finds candidate documents across local folders and cloud drives, extracts
//! their text, and sorts them into weighted academic-portfolio categories.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Source    │     │  Inventory  │     │  Extract +  │     │   Report    │
//! │ (local/drive│────▶│  (pass 1,   │────▶│  Classify   │────▶│ (pass 3,    │
//! │  adapters)  │     │   dedup)    │     │  (pass 2)   │     │  ordered)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **SourceAdapter**: uniform list/metadata/content contract per backend
//! - **Inventory**: deduplicated file stubs in root order
//! - **RuleTable**: validated, id-ordered classification rules
//! - **ClassificationResult**: per-category scores, primary, secondary, rationale
//! - **InventoryCache**: extracted text keyed by file and modified time

pub mod cache;
pub mod classify;
pub mod config;
pub mod effort;
pub mod error;
pub mod extractor;
pub mod inventory;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod scan_path;
pub mod source;
pub mod tagging;
pub mod types;

// Re-exports for convenience
pub use cache::InventoryCache;
pub use classify::{Category, ClassificationResult, Classifier, RuleTable, Weight};
pub use config::AppConfig;
pub use error::{DossierError, Result, RuleError, SourceError};
pub use extractor::ExtractorRegistry;
pub use inventory::{Inventory, InventoryBuilder, InventoryOptions};
pub use pipeline::{Pipeline, PipelineConfig, RunOutcome};
pub use progress::{NullProgress, Phase, ProgressEvent, ProgressSink};
pub use report::{Report, ReportRecord, ScanStatus};
pub use source::{AdapterRegistry, LocalAdapter, RemoteAdapter, SourceAdapter};
pub use types::{FileKey, FileRecord, SourceKind};
