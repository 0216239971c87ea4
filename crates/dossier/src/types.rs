//! Core types shared by every pass
//!
//! A [`FileRecord`] is created by the inventory builder, enriched by the
//! extractor, and then read by the classifier, the effort estimator and the
//! report assembler. Identity is the [`FileKey`]: adapter name plus the
//! canonical path (local) or remote id.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Serde helpers for Arc<str>
// ============================================================================

/// Serializes `Arc<str>` as a plain string.
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s))
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Name of the adapter a file was discovered through (e.g. "local", "drive:work").
pub type SourceId = Arc<str>;

/// Canonical identity of a file across roots and runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKey {
    #[serde(with = "arc_str_serde")]
    pub source_id: SourceId,
    /// Canonical local path or remote file id
    pub id: String,
}

impl FileKey {
    pub fn new(source_id: SourceId, id: impl Into<String>) -> Self {
        Self {
            source_id,
            id: id.into(),
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.id)
    }
}

/// Whether an adapter reads local disk or a remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Remote,
}

// ============================================================================
// File records
// ============================================================================

/// Outcome of text extraction for one file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// Not yet attempted
    #[default]
    Pending,
    /// Text extracted during this run
    Extracted,
    /// Text reused from the inventory cache
    Cached,
    /// No usable text; classification relies on name/path signals
    Degraded { reason: String },
}

impl ExtractionStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracted => "extracted",
            Self::Cached => "cached",
            Self::Degraded { .. } => "degraded",
        }
    }
}

/// A discovered file. Stubs from pass 1 carry no text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub key: FileKey,
    /// Path shown to users (local path or remote folder path + name)
    pub display_path: String,
    /// File name including extension
    pub name: String,
    /// Lowercase extension without the dot ("" if none)
    pub extension: String,
    /// Size in bytes
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// blake3 of the fetched bytes (set when content was read this run)
    pub checksum: Option<String>,
    pub text: Option<String>,
    /// Free-form metadata (author hints, mime type, hour annotations)
    pub metadata: BTreeMap<String, String>,
    pub extraction: ExtractionStatus,
}

impl FileRecord {
    /// Create a stub; name and extension are derived from `display_path`.
    pub fn new(
        source_id: SourceId,
        id: impl Into<String>,
        display_path: impl Into<String>,
        size: u64,
        modified: DateTime<Utc>,
    ) -> Self {
        let display_path = display_path.into();
        let name = file_name_of(&display_path).to_string();
        let extension = extension_of(&name);
        Self {
            key: FileKey::new(source_id, id),
            display_path,
            name,
            extension,
            size,
            modified,
            checksum: None,
            text: None,
            metadata: BTreeMap::new(),
            extraction: ExtractionStatus::Pending,
        }
    }

    /// Override the extension (e.g. remote documents exported to another format).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = normalize_extension(extension);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[..idx],
            _ => &self.name,
        }
    }

    /// Calendar year of the modification time, used by the year filter.
    pub fn year(&self) -> i32 {
        self.modified.year()
    }

    /// Directory components of the display path (file name excluded).
    pub fn directory_segments(&self) -> impl Iterator<Item = &str> {
        let dir = match self.display_path.rfind(['/', '\\']) {
            Some(idx) => &self.display_path[..idx],
            None => "",
        };
        dir.split(['/', '\\']).filter(|s| !s.is_empty())
    }
}

/// Lowercase, dot-stripped form used for every extension comparison.
pub fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => normalize_extension(&name[idx + 1..]),
        _ => String::new(),
    }
}

// ============================================================================
// Pass 1 bookkeeping
// ============================================================================

/// Why a listed file did not enter the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Already inventoried through an earlier root
    Duplicate { first_root: String },
    ExcludedExtension,
    YearFiltered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub key: FileKey,
    pub root: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A single entry that could not be listed or read during a walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanError {
    pub path: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_record_derives_name_and_extension() {
        let record = FileRecord::new(Arc::from("local"), "/a/b/Drill_2024.MUSX", "/a/b/Drill_2024.MUSX", 10, ts());
        assert_eq!(record.name, "Drill_2024.MUSX");
        assert_eq!(record.extension, "musx");
        assert_eq!(record.stem(), "Drill_2024");
        assert_eq!(record.year(), 2024);
    }

    #[test]
    fn test_record_without_extension() {
        let record = FileRecord::new(Arc::from("local"), "/a/README", "/a/README", 1, ts());
        assert_eq!(record.extension, "");
        assert_eq!(record.stem(), "README");

        let dotfile = FileRecord::new(Arc::from("local"), "/a/.profile", "/a/.profile", 1, ts());
        assert_eq!(dotfile.extension, "");
        assert_eq!(dotfile.stem(), ".profile");
    }

    #[test]
    fn test_directory_segments() {
        let record = FileRecord::new(Arc::from("local"), "x", "/home/me/Teaching/2024/syllabus.pdf", 1, ts());
        let segments: Vec<&str> = record.directory_segments().collect();
        assert_eq!(segments, vec!["home", "me", "Teaching", "2024"]);
    }

    #[test]
    fn test_with_extension_normalizes() {
        let record = FileRecord::new(Arc::from("drive:work"), "abc123", "Reports/Annual Evaluation", 0, ts())
            .with_extension(".PDF");
        assert_eq!(record.extension, "pdf");
    }

    #[test]
    fn test_extraction_status_serialization() {
        let status = ExtractionStatus::degraded("no text extractor for .musx");
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"status":"degraded","reason":"no text extractor for .musx"}"#);
        let parsed: ExtractionStatus = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_degraded());
    }
}
