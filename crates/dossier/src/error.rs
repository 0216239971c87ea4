//! Error types for the dossier engine

use std::fmt;
use std::io;
use thiserror::Error;

/// Run-level error type.
///
/// Per-file problems (unreadable entries, failed extraction) never surface
/// here; they degrade the affected record instead.
#[derive(Error, Debug)]
pub enum DossierError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No search roots configured")]
    NoSearchRoots,

    #[error("Failed to load rule table from {path}: {reason}")]
    RuleTableLoad { path: String, reason: String },

    #[error("Invalid rule: {0}")]
    RuleConfigInvalid(#[from] RuleError),

    #[error("Source unavailable: {root}: {reason}")]
    SourceUnavailable { root: String, reason: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DossierError>;

/// Errors raised by a source adapter.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Content cannot be fetched (offline drive, permission, export refused).
    #[error("Not available: {0}")]
    NotAvailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Remote error: {0}")]
    Remote(String),
}

/// A single rejected rule entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleError {
    /// Position of the entry in the rule source.
    pub index: usize,
    pub rule_id: Option<String>,
    pub reason: String,
}

impl RuleError {
    pub fn new(index: usize, rule_id: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            index,
            rule_id: rule_id.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_id {
            Some(id) => write!(f, "rule #{} ({}): {}", self.index, id, self.reason),
            None => write!(f, "rule #{}: {}", self.index, self.reason),
        }
    }
}

impl std::error::Error for RuleError {}
