//! User-facing CLI errors
//!
//! Rendered as an `ERROR:` line, an optional `CONTEXT:` line and `TRY:`
//! hints. Engine errors are mapped here so the binary never prints a bare
//! `Debug` dump.

use dossier::{DossierError, RuleError};
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    pub fn file_not_found(path: &Path) -> Self {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ".".to_string());
        Self::new(format!("No such file: {}", path.display()))
            .with_context("Paths are resolved against the current directory")
            .with_suggestion(format!("TRY: List what is there: ls {}", parent))
    }

    /// Config file could not be read or parsed
    pub fn invalid_config(path: &Path, details: &str) -> Self {
        Self::new(format!("Cannot load config: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                "TRY: Config files are TOML, or YAML when named *.yaml / *.yml".to_string(),
                "TRY: Check field names: search_roots, extensions, years, rules_path".to_string(),
            ])
    }

    pub fn no_search_roots(path: &Path) -> Self {
        Self::new("No search roots configured")
            .with_context(format!("Config file: {}", path.display()))
            .with_suggestions([
                "TRY: Add at least one folder: search_roots = [\"~/Documents\"]".to_string(),
                "TRY: Remote folders use scheme:account/folder_id".to_string(),
            ])
    }

    pub fn rule_table(path: &str, reason: &str) -> Self {
        Self::new(format!("Cannot load rule table: {}", path))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Validate the file on its own: dossier rules --rules FILE".to_string(),
                "TRY: Omit rules_path to use the built-in rule matrix".to_string(),
            ])
    }

    pub fn rules_rejected(errors: &[RuleError]) -> Self {
        Self::new(format!("{} rule(s) rejected", errors.len()))
            .with_context("Rejected rules are skipped; the remaining rules still load")
            .with_suggestion("TRY: Fix the entries listed above and re-run: dossier rules --rules FILE")
    }

    /// Map run-level engine errors to actionable messages.
    pub fn from_dossier(err: DossierError, config_path: &Path) -> Self {
        match err {
            DossierError::NoSearchRoots => Self::no_search_roots(config_path),
            DossierError::RuleTableLoad { path, reason } => Self::rule_table(&path, &reason),
            DossierError::Config(details) => Self::invalid_config(config_path, &details),
            other => Self::new(other.to_string()),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}
