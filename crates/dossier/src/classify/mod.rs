//! Pass 2b: weighted multi-category classification
//!
//! A [`RuleTable`] is loaded once, validated rule by rule, and shared
//! read-only by every worker. The [`Classifier`] sums the weights of all
//! firing rules per category and resolves the primary category with a
//! name-ordered tie-break, so results never depend on evaluation order.

pub mod builtin;
pub mod engine;
pub mod matcher;
pub mod rules;

use crate::tagging::TagColor;
use std::collections::BTreeMap;

pub use engine::{Category, ClassificationResult, Classifier, Weight, UNCLASSIFIED};
pub use matcher::{Condition, Matcher, Signals};
pub use rules::{ClassificationRule, ConditionSpec, RuleSpec, RuleTable};

pub const TEACHING: &str = "Teaching";
pub const SERVICE: &str = "Service";
pub const SCHOLARLY: &str = "Scholarly / Creative";
pub const ADVISING: &str = "Advising";
pub const FORM: &str = "Form";

/// Tag color for each built-in category. Other categories get no color.
pub fn category_colors() -> BTreeMap<Category, TagColor> {
    [
        (TEACHING, TagColor::Green),
        (SCHOLARLY, TagColor::Blue),
        (SERVICE, TagColor::Yellow),
        (ADVISING, TagColor::Purple),
        (FORM, TagColor::Orange),
    ]
    .into_iter()
    .map(|(name, color)| (Category::new(name), color))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_colors() {
        let colors = category_colors();
        assert_eq!(colors.get(&Category::new(TEACHING)), Some(&TagColor::Green));
        assert_eq!(colors.get(&Category::new(SCHOLARLY)), Some(&TagColor::Blue));
        assert_eq!(colors.get(&Category::unclassified()), None);
        assert_eq!(colors.len(), 5);
    }
}
