//! Rules command - validate and list a rule table

use crate::cli::error::HelpfulError;
use crate::cli::output::{color_for_category, print_table_colored};
use crate::cli::load_rules;
use dossier::classify::ClassificationRule;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct RulesArgs {
    /// Rule table file (default: built-in rule matrix)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RuleView {
    id: String,
    category: String,
    weight: f64,
    subcategory: Option<String>,
    destination: Option<String>,
    description: String,
    conditions: Vec<String>,
}

impl From<&ClassificationRule> for RuleView {
    fn from(rule: &ClassificationRule) -> Self {
        Self {
            id: rule.id.clone(),
            category: rule.category.to_string(),
            weight: rule.weight.as_f64(),
            subcategory: rule.subcategory.clone(),
            destination: rule.destination.clone(),
            description: rule.description.clone(),
            conditions: rule.matcher.conditions.iter().map(|c| c.describe()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectedView {
    index: usize,
    rule_id: Option<String>,
    reason: String,
}

pub fn run(args: RulesArgs) -> anyhow::Result<()> {
    let (table, rejected) = load_rules(args.rules.as_deref())?;
    let rules: Vec<RuleView> = table.rules().iter().map(RuleView::from).collect();

    if args.json {
        let rejected: Vec<RejectedView> = rejected
            .iter()
            .map(|e| RejectedView {
                index: e.index,
                rule_id: e.rule_id.clone(),
                reason: e.reason.clone(),
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "rules": rules, "rejected": rejected }))?
        );
    } else {
        let rows = rules
            .iter()
            .map(|rule| {
                vec![
                    (rule.id.clone(), None),
                    (rule.category.clone(), color_for_category(&rule.category)),
                    (rule.weight.to_string(), None),
                    (rule.destination.clone().unwrap_or_default(), None),
                    (rule.conditions.join("\n"), None),
                ]
            })
            .collect();
        print_table_colored(&["Id", "Category", "Weight", "Destination", "Conditions"], rows);
        println!("{} rule(s) loaded", rules.len());
        for error in &rejected {
            eprintln!("REJECTED: {}", error);
        }
    }

    if !rejected.is_empty() {
        return Err(HelpfulError::rules_rejected(&rejected).into());
    }
    Ok(())
}
