//! Pass 2a: text extraction
//!
//! Capability dispatch keyed by extension. Extraction never fails a run: the
//! pipeline turns every [`ExtractionError`] into a degraded record and keeps
//! classifying on name and path signals.

pub mod document;
pub mod spreadsheet;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use document::{OfficeXmlExtractor, PdfExtractor};
pub use spreadsheet::{CsvExtractor, XlsxExtractor};

/// Errors that can occur during extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no text extractor for .{0}")]
    Unsupported(String),

    #[error("malformed {format}: {reason}")]
    Malformed { format: &'static str, reason: String },

    #[error("extraction requires the '{0}' feature")]
    FeatureDisabled(String),

    /// Content could not be fetched from the source
    #[error("content unavailable: {0}")]
    Source(String),
}

impl ExtractionError {
    pub fn malformed(format: &'static str, reason: impl ToString) -> Self {
        Self::Malformed {
            format,
            reason: reason.to_string(),
        }
    }
}

/// Turns raw bytes of one or more file formats into plain text.
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lowercase extensions (no dot) this extractor handles.
    fn extensions(&self) -> &[&'static str];

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// UTF-8 text formats; invalid sequences are replaced, never rejected.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn extensions(&self) -> &[&'static str] {
        &["txt", "md", "bib", "tex", "rtf"]
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Extractors by extension. Later registrations win.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain text, office documents, spreadsheets and (with the `pdf`
    /// feature) PDF.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlainTextExtractor));
        registry.register(Arc::new(OfficeXmlExtractor));
        registry.register(Arc::new(CsvExtractor));
        registry.register(Arc::new(XlsxExtractor));
        registry.register(Arc::new(PdfExtractor));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn TextExtractor>) {
        for ext in extractor.extensions() {
            self.by_extension.insert(ext.to_string(), Arc::clone(&extractor));
        }
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn TextExtractor>> {
        self.by_extension.get(extension)
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.by_extension.contains_key(extension)
    }

    pub fn extract(&self, extension: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        match self.get(extension) {
            Some(extractor) => extractor.extract(bytes),
            None => Err(ExtractionError::Unsupported(extension.to_string())),
        }
    }
}
