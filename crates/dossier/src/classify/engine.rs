//! Scoring and primary-category resolution.

use super::matcher::Signals;
use super::rules::{ClassificationRule, RuleTable};
use crate::types::FileRecord;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::sync::Arc;

/// Reserved category for files no rule matched.
pub const UNCLASSIFIED: &str = "Unclassified";

/// Thousandths per unit weight.
const WEIGHT_SCALE: u64 = 1000;

/// Rule weight in fixed-point thousandths.
///
/// Integer addition is associative, so a category's score is the same no
/// matter which order its rules fire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Weight(u64);

impl Weight {
    pub const ZERO: Weight = Weight(0);

    /// Positive finite weights only; values that round to zero are rejected.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let scaled = (value * WEIGHT_SCALE as f64).round();
        if scaled < 1.0 || scaled > u64::MAX as f64 {
            return None;
        }
        Some(Weight(scaled as u64))
    }

    pub fn thousandths(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / WEIGHT_SCALE as f64
    }
}

impl Add for Weight {
    type Output = Weight;

    fn add(self, rhs: Weight) -> Weight {
        Weight(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Weight {
    fn sum<I: Iterator<Item = Weight>>(iter: I) -> Weight {
        iter.fold(Weight::ZERO, Add::add)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WEIGHT_SCALE;
        let frac = self.0 % WEIGHT_SCALE;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:03}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for Weight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Weight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Weight::from_f64(value)
            .ok_or_else(|| serde::de::Error::custom(format!("weight must be positive and finite, got {value}")))
    }
}

/// Category name. Ordered by name, which is the tie-break order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Category(name.into())
    }

    pub fn unclassified() -> Self {
        Category(UNCLASSIFIED.to_string())
    }

    pub fn is_unclassified(&self) -> bool {
        self.0 == UNCLASSIFIED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-file classification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub scores: BTreeMap<Category, Weight>,
    pub primary: Category,
    /// Every category with a score, descending score then name
    pub all_matching_categories: Vec<Category>,
    pub subcategory: Option<String>,
    pub destination: Option<String>,
    /// One line per fired rule, in rule id order
    pub rationale: Vec<String>,
}

impl ClassificationResult {
    pub fn unclassified() -> Self {
        Self {
            scores: BTreeMap::new(),
            primary: Category::unclassified(),
            all_matching_categories: Vec::new(),
            subcategory: None,
            destination: None,
            rationale: Vec::new(),
        }
    }

    pub fn is_unclassified(&self) -> bool {
        self.primary.is_unclassified()
    }

    /// Score of the primary category (zero when unclassified).
    pub fn score(&self) -> Weight {
        self.scores.get(&self.primary).copied().unwrap_or(Weight::ZERO)
    }

    pub fn secondary(&self) -> &[Category] {
        self.all_matching_categories.get(1..).unwrap_or(&[])
    }
}

pub struct Classifier {
    rules: Arc<RuleTable>,
}

impl Classifier {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn classify_record(&self, record: &FileRecord, text_scan_limit: Option<usize>) -> ClassificationResult {
        self.classify(&Signals::from_record(record, text_scan_limit))
    }

    pub fn classify(&self, signals: &Signals) -> ClassificationResult {
        let mut scores: BTreeMap<Category, Weight> = BTreeMap::new();
        // Heaviest rule per category; rules arrive in id order so the first
        // of equal weight is the smaller id.
        let mut labels: BTreeMap<&Category, &ClassificationRule> = BTreeMap::new();
        let mut rationale = Vec::new();

        for rule in self.rules.rules() {
            if !rule.matcher.matches(signals) {
                continue;
            }
            let score = scores.entry(rule.category.clone()).or_insert(Weight::ZERO);
            *score = *score + rule.weight;
            rationale.push(rule.rationale_line());

            match labels.get(&rule.category) {
                Some(best) if best.weight >= rule.weight => {}
                _ => {
                    labels.insert(&rule.category, rule);
                }
            }
        }

        if scores.is_empty() {
            return ClassificationResult::unclassified();
        }

        let mut all_matching_categories: Vec<Category> = scores.keys().cloned().collect();
        all_matching_categories.sort_by(|a, b| scores[b].cmp(&scores[a]).then_with(|| a.cmp(b)));
        let primary = all_matching_categories[0].clone();
        let label_rule = labels.get(&primary);

        ClassificationResult {
            subcategory: label_rule.and_then(|r| r.subcategory.clone()),
            destination: label_rule.and_then(|r| r.destination.clone()),
            scores,
            primary,
            all_matching_categories,
            rationale,
        }
    }
}
