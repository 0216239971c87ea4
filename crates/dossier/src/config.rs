//! Run configuration
//!
//! Loaded once per run from TOML or YAML (picked by file extension) and
//! never mutated afterwards.

use crate::effort::EffortConfig;
use crate::error::{DossierError, Result};
use crate::scan_path::expand_scan_path;
use crate::types::normalize_extension;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Directory names pruned from every walk unless the config overrides them.
pub const DEFAULT_IGNORED_DIRECTORIES: &[&str] = &[".git", "node_modules", "__pycache__"];

/// User configurable settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local paths (`~` expanded) or adapter-qualified roots (`drive:<account>/<folder>`)
    #[serde(default)]
    pub search_roots: Vec<String>,

    /// Directory names never descended into
    #[serde(default = "default_ignored_directories")]
    pub ignored_directories: Vec<String>,

    /// Named extension groups; the include set is their union
    #[serde(default = "default_extensions")]
    pub extensions: BTreeMap<String, Vec<String>>,

    /// Keep only files modified in one of these years
    #[serde(default)]
    pub years: Option<BTreeSet<i32>>,

    #[serde(default)]
    pub include_hidden: bool,

    #[serde(default)]
    pub follow_symlinks: bool,

    /// Files analyzed concurrently in pass 2
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Concurrent fetches allowed against remote sources
    #[serde(default = "default_remote_concurrency")]
    pub remote_concurrency: usize,

    /// Inventory cache location (default: `$DOSSIER_HOME/cache/inventory.json`)
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    /// Rule table file; the built-in academic matrix is used when absent
    #[serde(default)]
    pub rules_path: Option<PathBuf>,

    /// Only the first N characters of extracted text are matched against
    /// rules (default 500). `0` matches the whole text.
    #[serde(default = "default_text_scan_limit")]
    pub text_scan_limit: Option<usize>,

    /// Free-form run metadata (e.g. `author`)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub reporting: Option<ReportingConfig>,

    #[serde(default)]
    pub effort: EffortConfig,
}

/// Output settings for the report stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub output_directory: PathBuf,
    #[serde(default)]
    pub include_text_snippets: bool,
}

fn default_ignored_directories() -> Vec<String> {
    DEFAULT_IGNORED_DIRECTORIES.iter().map(|s| s.to_string()).collect()
}

fn default_extensions() -> BTreeMap<String, Vec<String>> {
    let groups: [(&str, &[&str]); 4] = [
        ("documents", &["pdf", "docx", "doc", "pptx", "txt", "md"]),
        ("spreadsheets", &["csv", "xlsx"]),
        ("notation", &["musx", "sib"]),
        ("references", &["bib"]),
    ];
    groups
        .iter()
        .map(|(name, exts)| (name.to_string(), exts.iter().map(|e| e.to_string()).collect()))
        .collect()
}

fn default_max_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

fn default_remote_concurrency() -> usize {
    4
}

/// Rule matching sees the opening of a document, not its body.
pub const DEFAULT_TEXT_SCAN_LIMIT: usize = 500;

fn default_text_scan_limit() -> Option<usize> {
    Some(DEFAULT_TEXT_SCAN_LIMIT)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_roots: Vec::new(),
            ignored_directories: default_ignored_directories(),
            extensions: default_extensions(),
            years: None,
            include_hidden: false,
            follow_symlinks: false,
            max_concurrency: default_max_concurrency(),
            remote_concurrency: default_remote_concurrency(),
            cache_path: None,
            rules_path: None,
            text_scan_limit: default_text_scan_limit(),
            metadata: BTreeMap::new(),
            reporting: None,
            effort: EffortConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML or YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = if is_yaml(path) {
            serde_yaml::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };

        // Relative paths in the file are relative to the file itself.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.rules_path = config.rules_path.map(|p| resolve_relative(base, &p));
        config.cache_path = config.cache_path.map(|p| resolve_relative(base, &p));
        if let Some(reporting) = config.reporting.as_mut() {
            reporting.output_directory = resolve_relative(base, &reporting.output_directory);
        }
        Ok(config)
    }

    /// Reject configurations that cannot start a run.
    pub fn validate(&self) -> Result<()> {
        if self.search_roots.iter().all(|r| r.trim().is_empty()) {
            return Err(DossierError::NoSearchRoots);
        }
        if self.max_concurrency == 0 {
            return Err(DossierError::Config("max_concurrency must be at least 1".to_string()));
        }
        if self.remote_concurrency == 0 {
            return Err(DossierError::Config("remote_concurrency must be at least 1".to_string()));
        }
        if self.include_extensions().is_empty() {
            return Err(DossierError::Config("no file extensions configured".to_string()));
        }
        self.effort.validate()?;
        Ok(())
    }

    /// Search roots with `~` expanded for local entries; blank entries dropped.
    pub fn resolved_roots(&self) -> Vec<String> {
        self.search_roots
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|root| {
                if root.starts_with('~') {
                    expand_scan_path(Path::new(root)).to_string_lossy().into_owned()
                } else {
                    root.to_string()
                }
            })
            .collect()
    }

    /// Union of every extension group, normalized.
    pub fn include_extensions(&self) -> BTreeSet<String> {
        self.extensions
            .values()
            .flatten()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn resolved_cache_path(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| dossier_logging::dossier_home().join("cache").join("inventory.json"))
    }

    pub fn include_text_snippets(&self) -> bool {
        self.reporting
            .as_ref()
            .map(|r| r.include_text_snippets)
            .unwrap_or(false)
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
        Some("yaml") | Some("yml")
    )
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_scan_path(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.max_concurrency > 0);
        assert_eq!(config.remote_concurrency, 4);
        assert!(config.ignored_directories.contains(&".git".to_string()));
        let exts = config.include_extensions();
        assert!(exts.contains("musx"));
        assert!(exts.contains("pdf"));
        assert!(config.years.is_none());
        assert_eq!(config.text_scan_limit, Some(DEFAULT_TEXT_SCAN_LIMIT));
    }

    #[test]
    fn test_zero_roots_is_fatal() {
        let config = AppConfig::default();
        assert!(matches!(config.validate(), Err(DossierError::NoSearchRoots)));

        let config = AppConfig {
            search_roots: vec!["   ".to_string()],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(DossierError::NoSearchRoots)));
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dossier.toml");
        std::fs::write(
            &path,
            r#"
search_roots = ["/data/teaching", "drive:work/folder-1"]
ignored_directories = ["Archive"]
years = [2023, 2024]
rules_path = "rules.toml"
text_scan_limit = 0

[extensions]
documents = [".PDF", "docx"]

[reporting]
output_directory = "out"
include_text_snippets = true
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.search_roots.len(), 2);
        assert_eq!(config.ignored_directories, vec!["Archive"]);
        assert_eq!(config.years.as_ref().unwrap().len(), 2);
        assert_eq!(config.rules_path.as_deref(), Some(dir.path().join("rules.toml").as_path()));
        assert_eq!(
            config.include_extensions().into_iter().collect::<Vec<_>>(),
            vec!["docx".to_string(), "pdf".to_string()]
        );
        assert!(config.include_text_snippets());
        assert_eq!(config.text_scan_limit, Some(0));
        assert!(config.validate().is_ok());
        assert_eq!(config.reporting.unwrap().output_directory, dir.path().join("out"));
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dossier.yaml");
        std::fs::write(
            &path,
            "search_roots:\n  - /data\nignored_directories:\n  - .git\nmetadata:\n  author: Dr. Example\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.search_roots, vec!["/data"]);
        assert_eq!(config.metadata.get("author").map(String::as_str), Some("Dr. Example"));
        // Extensions fall back to the defaults.
        assert!(config.include_extensions().contains("sib"));
        assert_eq!(config.text_scan_limit, Some(DEFAULT_TEXT_SCAN_LIMIT));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "search_roots = [").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(DossierError::Toml(_))));
    }

    #[test]
    fn test_resolved_roots_drops_blank() {
        let config = AppConfig {
            search_roots: vec!["/data".to_string(), "".to_string(), "drive:work/abc".to_string()],
            ..AppConfig::default()
        };
        assert_eq!(config.resolved_roots(), vec!["/data", "drive:work/abc"]);
    }
}
