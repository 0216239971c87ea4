//! Effort estimation
//!
//! Advisory only: the heuristic turns size, category and revision markers
//! into a rough hours figure for portfolio summaries. An explicit author
//! annotation (`HoursSpent: 3.5` in the text, or `hours_spent` metadata)
//! always wins over the heuristic.
//!
//! For a fixed category the estimate never decreases as the size tier grows,
//! and for a fixed tier it never decreases as the category weight grows.

use crate::classify::{ClassificationResult, ADVISING, FORM, SCHOLARLY, SERVICE, TEACHING, UNCLASSIFIED};
use crate::error::{DossierError, Result};
use crate::types::FileRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key holding an explicit hours figure.
pub const HOURS_METADATA_KEY: &str = "hours_spent";

const MAX_REVISION_MARKERS: u32 = 4;
const REVISION_BONUS: f64 = 0.25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffortConfig {
    /// Multiplier per category name
    #[serde(default = "default_category_weights")]
    pub category_weights: BTreeMap<String, f64>,

    /// Multiplier for categories missing from `category_weights`
    #[serde(default = "default_fallback_weight")]
    pub fallback_weight: f64,

    /// Text marker preceding an explicit hours figure
    #[serde(default = "default_annotation_marker")]
    pub annotation_marker: String,
}

fn default_category_weights() -> BTreeMap<String, f64> {
    [
        (SCHOLARLY, 2.0),
        (TEACHING, 1.5),
        (SERVICE, 1.0),
        (ADVISING, 1.0),
        (FORM, 0.5),
        (UNCLASSIFIED, 0.25),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

fn default_fallback_weight() -> f64 {
    1.0
}

fn default_annotation_marker() -> String {
    "HoursSpent:".to_string()
}

impl Default for EffortConfig {
    fn default() -> Self {
        Self {
            category_weights: default_category_weights(),
            fallback_weight: default_fallback_weight(),
            annotation_marker: default_annotation_marker(),
        }
    }
}

impl EffortConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |w: f64| !w.is_finite() || w < 0.0;
        if let Some((name, weight)) = self.category_weights.iter().find(|(_, w)| invalid(**w)) {
            return Err(DossierError::Config(format!(
                "effort weight for '{name}' must be a non-negative number, got {weight}"
            )));
        }
        if invalid(self.fallback_weight) {
            return Err(DossierError::Config(format!(
                "effort fallback_weight must be a non-negative number, got {}",
                self.fallback_weight
            )));
        }
        if self.annotation_marker.trim().is_empty() {
            return Err(DossierError::Config("effort annotation_marker must not be blank".to_string()));
        }
        Ok(())
    }

    fn category_weight(&self, category: &str) -> f64 {
        self.category_weights
            .get(category)
            .copied()
            .unwrap_or(self.fallback_weight)
    }
}

/// File size bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeTier {
    /// Under 16 KiB
    Tiny,
    /// Under 256 KiB
    Small,
    /// Under 4 MiB
    Medium,
    /// Under 64 MiB
    Large,
    Huge,
}

impl SizeTier {
    pub fn from_size(bytes: u64) -> Self {
        const KIB: u64 = 1024;
        const MIB: u64 = 1024 * KIB;
        match bytes {
            b if b < 16 * KIB => SizeTier::Tiny,
            b if b < 256 * KIB => SizeTier::Small,
            b if b < 4 * MIB => SizeTier::Medium,
            b if b < 64 * MIB => SizeTier::Large,
            _ => SizeTier::Huge,
        }
    }

    pub fn base_hours(self) -> f64 {
        match self {
            SizeTier::Tiny => 0.25,
            SizeTier::Small => 0.5,
            SizeTier::Medium => 1.0,
            SizeTier::Large => 2.0,
            SizeTier::Huge => 4.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SizeTier::Tiny => "tiny",
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
            SizeTier::Huge => "huge",
        }
    }
}

/// How an estimate was derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffortBasis {
    /// Author-supplied figure; `marker` is the text marker or metadata key
    Annotated { marker: String },
    Heuristic {
        size_tier: SizeTier,
        category_weight: f64,
        revisions: u32,
    },
}

impl EffortBasis {
    /// Short form for tabular output.
    pub fn summary(&self) -> String {
        match self {
            EffortBasis::Annotated { marker } => format!("annotated ({marker})"),
            EffortBasis::Heuristic {
                size_tier,
                category_weight,
                revisions,
            } => format!(
                "heuristic (size={}, weight={category_weight}, revisions={revisions})",
                size_tier.as_str()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffortEstimate {
    /// Non-negative, rounded to hundredths
    pub hours: f64,
    pub basis: EffortBasis,
}

pub struct EffortEstimator {
    config: EffortConfig,
}

impl EffortEstimator {
    pub fn new(config: EffortConfig) -> Self {
        Self { config }
    }

    pub fn estimate(&self, record: &FileRecord, result: &ClassificationResult) -> EffortEstimate {
        if let Some(hours) = self.annotated_hours_in_text(record) {
            return EffortEstimate {
                hours: round_hours(hours),
                basis: EffortBasis::Annotated {
                    marker: self.config.annotation_marker.clone(),
                },
            };
        }
        if let Some(hours) = record.metadata.get(HOURS_METADATA_KEY).and_then(|v| parse_hours(v)) {
            return EffortEstimate {
                hours: round_hours(hours),
                basis: EffortBasis::Annotated {
                    marker: HOURS_METADATA_KEY.to_string(),
                },
            };
        }

        let size_tier = SizeTier::from_size(record.size);
        let category_weight = self.config.category_weight(result.primary.as_str());
        let revisions = revision_markers(record.stem());
        let hours = size_tier.base_hours()
            * category_weight
            * (1.0 + REVISION_BONUS * f64::from(revisions));

        EffortEstimate {
            hours: round_hours(hours),
            basis: EffortBasis::Heuristic {
                size_tier,
                category_weight,
                revisions,
            },
        }
    }

    fn annotated_hours_in_text(&self, record: &FileRecord) -> Option<f64> {
        let text = record.text.as_deref()?;
        let marker = self.config.annotation_marker.as_str();
        let (_, after) = text.split_once(marker)?;
        parse_hours(after.split_whitespace().next()?)
    }
}

fn parse_hours(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().trim_end_matches([',', ';', '.']).parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Distinct revision tokens in a file stem (`v2`, `rev`, `draft`, `final`).
fn revision_markers(stem: &str) -> u32 {
    let mut seen: Vec<String> = Vec::new();
    for token in stem
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        let is_version = token.len() > 1
            && token.starts_with('v')
            && token[1..].chars().all(|c| c.is_ascii_digit());
        let is_marker = matches!(token.as_str(), "rev" | "revised" | "revision" | "draft" | "final");
        if (is_version || is_marker) && !seen.contains(&token) {
            seen.push(token);
        }
    }
    (seen.len() as u32).min(MAX_REVISION_MARKERS)
}

fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}
