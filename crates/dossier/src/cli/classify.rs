//! Classify command - explain how one local file is classified

use crate::cli::error::HelpfulError;
use crate::cli::output::{color_for_category, format_hours, print_table_colored};
use crate::cli::{load_config, load_rules, print_rule_errors, runtime};
use dossier::{AdapterRegistry, AppConfig, ExtractorRegistry, InventoryCache, LocalAdapter, Pipeline, PipelineConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, clap::Args)]
pub struct ClassifyArgs {
    /// File to classify
    pub path: PathBuf,

    /// Rule table file (default: config's rules_path, else built-in)
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Config file for effort weights and text scan limit
    #[arg(short, long, env = "DOSSIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Explanation<'a> {
    path: &'a str,
    extraction: &'a str,
    #[serde(flatten)]
    classification: &'a dossier::ClassificationResult,
    effort: &'a dossier::effort::EffortEstimate,
}

pub fn run(args: ClassifyArgs) -> anyhow::Result<()> {
    if !args.path.exists() {
        return Err(HelpfulError::file_not_found(&args.path).into());
    }
    let config = match &args.config {
        Some(path) => load_config(path, &[])?,
        None => AppConfig::default(),
    };
    let rules_path = args.rules.clone().or_else(|| config.rules_path.clone());
    let (rules, rejected) = load_rules(rules_path.as_deref())?;
    print_rule_errors(&rejected);

    let handle = LocalAdapter::new()
        .handle_for_file(&args.path)
        .map_err(|e| HelpfulError::new(e.to_string()).with_context(format!("Reading {}", args.path.display())))?;

    let pipeline = Pipeline::new(
        PipelineConfig::from_app_config(&config),
        AdapterRegistry::with_local(),
        Arc::new(rules),
        ExtractorRegistry::with_defaults(),
        InventoryCache::new(),
    )?;
    let outcome = runtime()?.block_on(pipeline.analyze(handle))?;
    let result = &outcome.classification;

    if args.json {
        let explanation = Explanation {
            path: &outcome.record.display_path,
            extraction: outcome.record.extraction.as_str(),
            classification: result,
            effort: &outcome.effort,
        };
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    println!("{}", outcome.record.display_path);
    if let dossier::types::ExtractionStatus::Degraded { reason } = &outcome.record.extraction {
        println!("Text extraction degraded: {}", reason);
    }
    let mut scores: Vec<_> = result.scores.iter().collect();
    scores.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let rows = scores
        .into_iter()
        .map(|(category, weight)| {
            let marker = if *category == result.primary { "primary" } else { "" };
            vec![
                (category.to_string(), color_for_category(category.as_str())),
                (weight.to_string(), None),
                (marker.to_string(), None),
            ]
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        println!("Primary category: {}", result.primary);
    } else {
        print_table_colored(&["Category", "Score", ""], rows);
    }
    if let Some(subcategory) = &result.subcategory {
        println!("Subcategory: {}", subcategory);
    }
    if let Some(destination) = &result.destination {
        println!("Destination: {}", destination);
    }
    for line in &result.rationale {
        println!("  - {}", line);
    }
    println!(
        "Estimated effort: {} ({})",
        format_hours(outcome.effort.hours),
        outcome.effort.basis.summary()
    );
    Ok(())
}
