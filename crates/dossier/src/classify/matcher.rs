//! Rule conditions and the signals they are evaluated against.
//!
//! Every comparison is case-insensitive: [`Signals`] are lowercased once per
//! file and condition values are lowercased at compile time.

use super::rules::ConditionSpec;
use crate::types::{normalize_extension, FileRecord};
use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

/// Compiled regex size cap for user-supplied text patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Metadata that describes transport, not the document.
const NON_DESCRIPTIVE_KEYS: &[&str] = &["mime_type", "web_view_link"];

/// Lowercased views of one file, built once and shared by every rule.
#[derive(Debug, Clone, Default)]
pub struct Signals {
    pub name: String,
    pub extension: String,
    /// Display path with forward slashes
    pub path: String,
    /// Directory components of the path
    pub segments: Vec<String>,
    /// Extracted text (possibly windowed)
    pub text: String,
    /// Token sequences of stem, extension, metadata values and text
    pub keyword_tokens: Vec<Vec<String>>,
}

impl Signals {
    /// `text_scan_limit` keeps only the first N characters of the text.
    pub fn from_record(record: &FileRecord, text_scan_limit: Option<usize>) -> Self {
        let text = record.text.as_deref().unwrap_or("");
        let text = match text_scan_limit {
            Some(limit) => match text.char_indices().nth(limit) {
                Some((end, _)) => &text[..end],
                None => text,
            },
            None => text,
        };
        let text = text.to_lowercase();

        let mut keyword_tokens = vec![tokenize(record.stem()), tokenize(&record.extension)];
        keyword_tokens.extend(
            record
                .metadata
                .iter()
                .filter(|(key, _)| !NON_DESCRIPTIVE_KEYS.contains(&key.as_str()))
                .map(|(_, value)| tokenize(value)),
        );
        keyword_tokens.push(tokenize(&text));
        keyword_tokens.retain(|tokens| !tokens.is_empty());

        Self {
            name: record.name.to_lowercase(),
            extension: record.extension.clone(),
            path: record.display_path.replace('\\', "/").to_lowercase(),
            segments: record.directory_segments().map(str::to_lowercase).collect(),
            text,
            keyword_tokens,
        }
    }
}

/// Lowercase alphanumeric runs.
fn tokenize(haystack: &str) -> Vec<String> {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// One typed test over [`Signals`]. Each variant is an any-of over its values.
#[derive(Debug, Clone)]
pub enum Condition {
    ExtensionIn(BTreeSet<String>),
    FilenameContains(Vec<String>),
    /// Equality with any directory component
    PathSegment(Vec<String>),
    TextContains(Vec<String>),
    /// Phrase whose words are prefixes of consecutive tokens. Any one phrase
    /// is enough; a rule that needs every keyword lists one `keyword_prefix`
    /// condition per keyword, since a rule's conditions are ANDed.
    KeywordPrefix(Vec<Vec<String>>),
    /// Glob over the path (patterns without `/` match at any depth)
    FilenameGlob(Vec<GlobMatcher>),
    TextPattern(Vec<Regex>),
}

impl Condition {
    pub fn matches(&self, signals: &Signals) -> bool {
        match self {
            Condition::ExtensionIn(exts) => exts.contains(&signals.extension),
            Condition::FilenameContains(needles) => needles.iter().any(|n| signals.name.contains(n.as_str())),
            Condition::PathSegment(segments) => segments
                .iter()
                .any(|wanted| signals.segments.iter().any(|s| s == wanted)),
            Condition::TextContains(needles) => needles.iter().any(|n| signals.text.contains(n.as_str())),
            Condition::KeywordPrefix(phrases) => phrases.iter().any(|phrase| {
                signals
                    .keyword_tokens
                    .iter()
                    .any(|tokens| phrase_matches(phrase, tokens))
            }),
            Condition::FilenameGlob(globs) => {
                let candidate = signals.path.trim_start_matches('/');
                globs.iter().any(|g| g.is_match(candidate))
            }
            Condition::TextPattern(patterns) => patterns.iter().any(|p| p.is_match(&signals.text)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Condition::ExtensionIn(_) => "extension_in",
            Condition::FilenameContains(_) => "filename_contains",
            Condition::PathSegment(_) => "path_segment",
            Condition::TextContains(_) => "text_contains",
            Condition::KeywordPrefix(_) => "keyword_prefix",
            Condition::FilenameGlob(_) => "filename_glob",
            Condition::TextPattern(_) => "text_pattern",
        }
    }

    /// `kind: value, value` for listings.
    pub fn describe(&self) -> String {
        let values: Vec<String> = match self {
            Condition::ExtensionIn(exts) => exts.iter().cloned().collect(),
            Condition::FilenameContains(values)
            | Condition::PathSegment(values)
            | Condition::TextContains(values) => values.clone(),
            Condition::KeywordPrefix(phrases) => phrases.iter().map(|p| p.join(" ")).collect(),
            Condition::FilenameGlob(globs) => globs.iter().map(|g| g.glob().glob().to_string()).collect(),
            Condition::TextPattern(patterns) => patterns.iter().map(|p| p.as_str().to_string()).collect(),
        };
        format!("{}: {}", self.kind(), values.join(", "))
    }

    /// Compile a condition entry, rejecting empty or blank values.
    pub fn from_spec(spec: &ConditionSpec) -> Result<Self, String> {
        let kind = spec.kind();
        let values = spec.values();
        if values.is_empty() {
            return Err(format!("{kind} condition has no values"));
        }
        if values.iter().any(|v| v.trim().is_empty()) {
            return Err(format!("{kind} condition has a blank value"));
        }
        let lowered = || values.iter().map(|v| v.trim().to_lowercase()).collect::<Vec<_>>();

        let condition = match spec {
            ConditionSpec::ExtensionIn { values } => {
                let exts: BTreeSet<String> = values.iter().map(|v| normalize_extension(v)).collect();
                if exts.iter().any(String::is_empty) {
                    return Err("extension_in condition has an empty extension".to_string());
                }
                Condition::ExtensionIn(exts)
            }
            ConditionSpec::FilenameContains { .. } => Condition::FilenameContains(lowered()),
            ConditionSpec::PathSegment { .. } => Condition::PathSegment(lowered()),
            ConditionSpec::TextContains { .. } => Condition::TextContains(lowered()),
            ConditionSpec::KeywordPrefix { .. } => {
                let phrases: Vec<Vec<String>> = lowered().iter().map(|phrase| tokenize(phrase)).collect();
                if phrases.iter().any(Vec::is_empty) {
                    return Err("keyword_prefix condition has a keyword without letters or digits".to_string());
                }
                Condition::KeywordPrefix(phrases)
            }
            ConditionSpec::FilenameGlob { values } => {
                let globs = values
                    .iter()
                    .map(|raw| build_glob(&normalize_glob_pattern(raw)).map_err(|e| format!("glob '{raw}': {e}")))
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::FilenameGlob(globs)
            }
            ConditionSpec::TextPattern { values } => {
                let patterns = values
                    .iter()
                    .map(|raw| {
                        RegexBuilder::new(raw)
                            .case_insensitive(true)
                            .size_limit(REGEX_SIZE_LIMIT)
                            .build()
                            .map_err(|e| format!("pattern '{raw}': {e}"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::TextPattern(patterns)
            }
        };
        Ok(condition)
    }
}

fn phrase_matches(phrase: &[String], tokens: &[String]) -> bool {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(phrase.len())
        .any(|window| window.iter().zip(phrase).all(|(token, word)| token.starts_with(word.as_str())))
}

/// Normalize a glob pattern for matching against relative paths.
///
/// - Empty or "*" becomes "**/*"
/// - Leading slashes are stripped
/// - Patterns without a path separator get a "**/" prefix
fn normalize_glob_pattern(raw: &str) -> String {
    let mut pattern = raw.trim().trim_start_matches('/').to_string();
    if pattern.is_empty() || pattern == "*" {
        pattern = "**/*".to_string();
    }
    if !pattern.contains('/') && !pattern.starts_with("**/") && pattern != "**/*" {
        pattern = format!("**/{}", pattern);
    }
    pattern
}

fn build_glob(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
}

/// Conjunction of conditions.
#[derive(Debug, Clone)]
pub struct Matcher {
    pub conditions: Vec<Condition>,
}

impl Matcher {
    pub fn matches(&self, signals: &Signals) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.matches(signals))
    }
}
