//! Rule table: declarative entries, per-rule validation, compiled rules.
//!
//! A rule file is TOML or YAML with a top-level `rules` list:
//!
//! ```toml
//! [[rules]]
//! id = "recruiting"
//! category = "Service"
//! subcategory = "Recruiting"
//! destination = "Primary PDF → Service Evidence"
//! weight = 3.0
//! conditions = [{ kind = "filename_contains", values = ["recruit"] }]
//! ```
//!
//! Entries are deserialized one at a time, so a malformed entry is rejected
//! with a [`RuleError`] while the rest of the table still loads.

use super::engine::{Category, Weight, UNCLASSIFIED};
use super::matcher::{Condition, Matcher};
use crate::config::is_yaml;
use crate::error::{DossierError, Result, RuleError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// One condition entry as written in a rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSpec {
    ExtensionIn { values: Vec<String> },
    FilenameContains { values: Vec<String> },
    PathSegment { values: Vec<String> },
    TextContains { values: Vec<String> },
    KeywordPrefix { values: Vec<String> },
    FilenameGlob { values: Vec<String> },
    TextPattern { values: Vec<String> },
}

impl ConditionSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ConditionSpec::ExtensionIn { .. } => "extension_in",
            ConditionSpec::FilenameContains { .. } => "filename_contains",
            ConditionSpec::PathSegment { .. } => "path_segment",
            ConditionSpec::TextContains { .. } => "text_contains",
            ConditionSpec::KeywordPrefix { .. } => "keyword_prefix",
            ConditionSpec::FilenameGlob { .. } => "filename_glob",
            ConditionSpec::TextPattern { .. } => "text_pattern",
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            ConditionSpec::ExtensionIn { values }
            | ConditionSpec::FilenameContains { values }
            | ConditionSpec::PathSegment { values }
            | ConditionSpec::TextContains { values }
            | ConditionSpec::KeywordPrefix { values }
            | ConditionSpec::FilenameGlob { values }
            | ConditionSpec::TextPattern { values } => values,
        }
    }
}

/// One rule entry as written in a rule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    pub weight: f64,
    /// All must hold
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

/// A validated, compiled rule.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub id: String,
    pub description: String,
    pub matcher: Matcher,
    pub category: Category,
    pub subcategory: Option<String>,
    pub destination: Option<String>,
    pub weight: Weight,
}

impl ClassificationRule {
    fn compile(spec: &RuleSpec) -> std::result::Result<Self, String> {
        let id = spec.id.trim();
        if id.is_empty() {
            return Err("missing id".to_string());
        }
        let category = spec.category.trim();
        if category.is_empty() {
            return Err("missing category".to_string());
        }
        if category.eq_ignore_ascii_case(UNCLASSIFIED) {
            return Err(format!("category '{UNCLASSIFIED}' is reserved"));
        }
        let weight = Weight::from_f64(spec.weight)
            .ok_or_else(|| format!("weight must be positive and finite, got {}", spec.weight))?;
        if spec.conditions.is_empty() {
            return Err("at least one condition is required".to_string());
        }
        let conditions = spec
            .conditions
            .iter()
            .map(Condition::from_spec)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let subcategory = non_blank(&spec.subcategory);
        let description = non_blank(&spec.description).unwrap_or_else(|| match &subcategory {
            Some(sub) => format!("{category}: {sub}"),
            None => category.to_string(),
        });

        Ok(Self {
            id: id.to_string(),
            description,
            matcher: Matcher { conditions },
            category: Category::new(category),
            subcategory,
            destination: non_blank(&spec.destination),
            weight,
        })
    }

    /// Rationale entry recorded when this rule fires.
    pub fn rationale_line(&self) -> String {
        format!("{}: {} [+{} {}]", self.id, self.description, self.weight, self.category)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Immutable set of compiled rules, sorted by id.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<ClassificationRule>,
}

impl RuleTable {
    /// Compile `specs`; invalid entries are returned alongside the table.
    pub fn from_specs(specs: Vec<RuleSpec>) -> (Self, Vec<RuleError>) {
        Self::compile(specs.into_iter().enumerate().collect(), Vec::new())
    }

    /// The built-in academic rule matrix.
    pub fn builtin() -> Self {
        let (table, errors) = Self::from_specs(super::builtin::default_rules());
        for error in &errors {
            warn!(error = %error, "Built-in rule rejected");
        }
        table
    }

    /// Load a TOML or YAML rule file (chosen by extension).
    ///
    /// Fatal when the file cannot be read or parsed, or when no entry is
    /// valid. Individually malformed entries come back as errors.
    pub fn load(path: &Path) -> Result<(Self, Vec<RuleError>)> {
        let load_error = |reason: String| DossierError::RuleTableLoad {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let parsed = if is_yaml(path) {
            Self::parse_yaml(&content)
        } else {
            Self::parse_toml(&content)
        };
        let (table, errors) = parsed.map_err(load_error)?;

        if table.is_empty() {
            let detail = errors
                .first()
                .map(|e| format!(" ({} rejected, first: {e})", errors.len()))
                .unwrap_or_default();
            return Err(load_error(format!("no valid rules{detail}")));
        }
        info!(path = %path.display(), rules = table.len(), rejected = errors.len(), "Loaded rule table");
        Ok((table, errors))
    }

    /// Parse TOML rule entries. `Err` only when the document itself is unusable.
    pub fn parse_toml(content: &str) -> std::result::Result<(Self, Vec<RuleError>), String> {
        let document: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        let entries = match document.get("rules") {
            Some(toml::Value::Array(entries)) => entries,
            Some(_) => return Err("'rules' must be an array of tables".to_string()),
            None => return Err("missing 'rules' list".to_string()),
        };

        let mut specs = Vec::new();
        let mut errors = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let id_hint = entry.get("id").and_then(|v| v.as_str());
            match entry.clone().try_into::<RuleSpec>() {
                Ok(spec) => specs.push((index, spec)),
                Err(e) => errors.push(RuleError::new(index, id_hint, e.to_string().trim())),
            }
        }
        Ok(Self::compile(specs, errors))
    }

    /// Parse YAML rule entries: a `rules:` list or a bare top-level list.
    pub fn parse_yaml(content: &str) -> std::result::Result<(Self, Vec<RuleError>), String> {
        let document: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let entries = match document.get("rules").unwrap_or(&document) {
            serde_yaml::Value::Sequence(entries) => entries,
            _ => return Err("missing 'rules' list".to_string()),
        };

        let mut specs = Vec::new();
        let mut errors = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            let id_hint = entry.get("id").and_then(|v| v.as_str());
            match serde_yaml::from_value::<RuleSpec>(entry.clone()) {
                Ok(spec) => specs.push((index, spec)),
                Err(e) => errors.push(RuleError::new(index, id_hint, e.to_string())),
            }
        }
        Ok(Self::compile(specs, errors))
    }

    fn compile(specs: Vec<(usize, RuleSpec)>, mut errors: Vec<RuleError>) -> (Self, Vec<RuleError>) {
        let mut seen: HashSet<String> = HashSet::new();
        let mut rules = Vec::with_capacity(specs.len());

        for (index, spec) in specs {
            match ClassificationRule::compile(&spec) {
                Ok(rule) if !seen.insert(rule.id.clone()) => {
                    errors.push(RuleError::new(index, Some(&rule.id), "duplicate rule id"));
                }
                Ok(rule) => rules.push(rule),
                Err(reason) => errors.push(RuleError::new(index, Some(spec.id.as_str()).filter(|id| !id.trim().is_empty()), reason)),
            }
        }

        for error in &errors {
            warn!(error = %error, "Rejected rule");
        }
        errors.sort_by_key(|e| e.index);
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        (Self { rules }, errors)
    }

    /// Rules in id order.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&ClassificationRule> {
        self.rules
            .binary_search_by(|rule| rule.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.rules[idx])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
