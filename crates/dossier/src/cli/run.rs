//! Run command - all three passes over the configured search roots
//!
//! Writes the report, persists the inventory cache when the run completed,
//! and prints destination totals.

use crate::cli::error::HelpfulError;
use crate::cli::output::{color_for_category, format_hours, format_size, print_table, print_table_colored};
use crate::cli::{load_config, load_rules, print_rule_errors, runtime};
use anyhow::Context;
use dossier::progress::{FnProgress, Phase, ProgressEvent};
use dossier::tagging::{tag_plan, write_plan};
use dossier::{
    AdapterRegistry, AppConfig, ExtractorRegistry, InventoryCache, Pipeline, PipelineConfig, Report, RunOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const BAR_RESOLUTION: u64 = 1000;

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Config file (TOML, or YAML by extension)
    #[arg(short, long, env = "DOSSIER_CONFIG")]
    pub config: PathBuf,

    /// Rule table overriding the config's rules_path
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Only files modified in this year (repeatable)
    #[arg(long = "year")]
    pub years: Vec<i32>,

    /// Report file (default: dossier_report_<year|all>.csv in the output directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write the report as JSON instead of CSV
    #[arg(long)]
    pub json: bool,

    /// Maximum files analyzed at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Ignore and do not update the inventory cache
    #[arg(long)]
    pub no_cache: bool,

    /// Write the tag plan for local files to this JSON file
    #[arg(long)]
    pub tag_plan: Option<PathBuf>,
}

pub fn run(args: RunArgs, verbose: bool) -> anyhow::Result<()> {
    let mut config = load_config(&args.config, &args.years)?;
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(rules) = &args.rules {
        config.rules_path = Some(rules.clone());
    }
    config
        .validate()
        .map_err(|e| HelpfulError::from_dossier(e, &args.config))?;

    let (rules, rejected) = load_rules(config.rules_path.as_deref())?;
    print_rule_errors(&rejected);

    let cache_path = config.resolved_cache_path();
    let cache = if args.no_cache {
        InventoryCache::new()
    } else {
        InventoryCache::load(&cache_path).unwrap_or_else(|e| {
            warn!(path = %cache_path.display(), error = %e, "Cannot read inventory cache, starting empty");
            InventoryCache::new()
        })
    };

    let mut pipeline_config = PipelineConfig::from_app_config(&config);
    pipeline_config.use_cache = !args.no_cache;
    let registry = AdapterRegistry::with_local();
    let pipeline = Pipeline::new(
        pipeline_config,
        registry.clone(),
        Arc::new(rules),
        ExtractorRegistry::with_defaults(),
        cache,
    )
    .map_err(|e| HelpfulError::from_dossier(e, &args.config))?;
    let roots = config.resolved_roots();

    let outcome = runtime()?.block_on(async {
        let cancel = CancellationToken::new();
        let ctrl_c = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling: finishing files in flight...");
                    cancel.cancel();
                }
            })
        };

        let bar = progress_bar(verbose);
        let sink = {
            let bar = bar.clone();
            FnProgress(move |event: ProgressEvent| update_bar(&bar, &event))
        };
        let result = pipeline.run(&roots, &sink, cancel).await;
        ctrl_c.abort();
        bar.finish_and_clear();
        result
    });
    let outcome = outcome.map_err(|e| HelpfulError::from_dossier(e, &args.config))?;

    let RunOutcome {
        inventory,
        report,
        stats,
        next_cache,
    } = outcome;

    for warning in &inventory.warnings {
        eprintln!("WARNING: search root unavailable: {} ({})", warning.root, warning.reason);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_report_path(&config, args.json));

    if let Some(plan_path) = &args.tag_plan {
        let plan = tag_plan(&report, |source| registry.kind_of(source));
        write_plan(&plan, plan_path).with_context(|| format!("Failed to write tag plan: {}", plan_path.display()))?;
        println!("Tag plan: {} file(s) -> {}", plan.len(), plan_path.display());
    }

    if args.json {
        report.write_json(&output)
    } else {
        report.write_csv(&output)
    }
    .with_context(|| format!("Failed to write report: {}", output.display()))?;

    if !args.no_cache && !report.partial {
        next_cache
            .save(&cache_path)
            .with_context(|| format!("Failed to save inventory cache: {}", cache_path.display()))?;
        info!(path = %cache_path.display(), entries = next_cache.len(), "Inventory cache saved");
    }

    print_summary(&report, inventory.total_bytes);
    println!(
        "Analyzed {} file(s): {} extracted, {} cached, {} degraded",
        stats.dispatched, stats.extracted, stats.cached, stats.degraded
    );
    println!("Report: {}", output.display());
    if report.partial {
        println!(
            "Run incomplete: {} file(s) not scanned, cache left unchanged",
            report.summary.not_scanned
        );
    }
    Ok(())
}

/// `dossier_report_<year|all>.<csv|json>` in the configured output directory.
fn default_report_path(config: &AppConfig, json: bool) -> PathBuf {
    let dir = config
        .reporting
        .as_ref()
        .map(|r| r.output_directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(report_file_name(config.years.as_ref().map(|y| y.iter().copied().collect()), json))
}

fn report_file_name(years: Option<Vec<i32>>, json: bool) -> String {
    let label = match years {
        Some(years) if !years.is_empty() => years
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join("-"),
        _ => "all".to_string(),
    };
    let ext = if json { "json" } else { "csv" };
    format!("dossier_report_{label}.{ext}")
}

fn progress_bar(verbose: bool) -> ProgressBar {
    if verbose {
        // Log lines own stderr.
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(BAR_RESOLUTION);
    let style = ProgressStyle::with_template("{spinner} [{bar:40}] {percent:>3}% {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

fn update_bar(bar: &ProgressBar, event: &ProgressEvent) {
    let phase = match event.phase {
        Phase::Inventory => "inventory",
        Phase::Analysis => "analysis",
        Phase::Report => "report",
    };
    let mut message = phase.to_string();
    if let Some((done, total)) = event.transfer {
        message.push_str(&format!(" {}/{}", format_size(done), format_size(total)));
    }
    bar.set_message(message);
    bar.set_position((event.fraction * BAR_RESOLUTION as f32) as u64);
}

fn print_summary(report: &Report, total_bytes: u64) {
    let rows: Vec<Vec<String>> = report
        .destination_totals()
        .into_iter()
        .map(|(destination, files)| vec![destination, files.to_string()])
        .collect();
    print_table(&["Destination", "Files"], rows);

    let categories: Vec<Vec<(String, Option<comfy_table::Color>)>> = report
        .summary
        .by_category
        .iter()
        .map(|(category, files)| {
            vec![
                (category.clone(), color_for_category(category)),
                (files.to_string(), None),
            ]
        })
        .collect();
    print_table_colored(&["Category", "Files"], categories);

    println!(
        "{} file(s), {} total, {} unclassified, estimated effort {}",
        report.summary.total,
        format_size(total_bytes),
        report.summary.unclassified,
        format_hours(report.summary.estimated_hours)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_file_name() {
        assert_eq!(report_file_name(None, false), "dossier_report_all.csv");
        assert_eq!(report_file_name(Some(vec![2024]), false), "dossier_report_2024.csv");
        assert_eq!(report_file_name(Some(vec![2023, 2024]), true), "dossier_report_2023-2024.json");
        assert_eq!(report_file_name(Some(vec![]), true), "dossier_report_all.json");
    }

    #[test]
    fn test_default_report_path_uses_output_directory() {
        let mut config = AppConfig::default();
        config.reporting = Some(dossier::config::ReportingConfig {
            output_directory: PathBuf::from("/tmp/reports"),
            include_text_snippets: false,
        });
        config.years = Some([2024].into_iter().collect());
        assert_eq!(
            default_report_path(&config, false),
            PathBuf::from("/tmp/reports/dossier_report_2024.csv")
        );
    }
}
