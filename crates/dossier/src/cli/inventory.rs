//! Inventory command - pass 1 only
//!
//! Lists what a run would analyze without fetching any content.

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, print_table};
use crate::cli::{load_config, runtime};
use dossier::types::SkipReason;
use dossier::{AdapterRegistry, Inventory, InventoryBuilder, InventoryOptions, NullProgress};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
pub struct InventoryArgs {
    /// Config file (TOML, or YAML by extension)
    #[arg(short, long, env = "DOSSIER_CONFIG")]
    pub config: PathBuf,

    /// Only files modified in this year (repeatable)
    #[arg(long = "year")]
    pub years: Vec<i32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct InventoryFile {
    source: String,
    path: String,
    extension: String,
    size: u64,
    modified: String,
    root: String,
}

#[derive(Debug, Serialize)]
struct InventoryOutput {
    files: Vec<InventoryFile>,
    total_bytes: u64,
    files_seen: u64,
    duplicates: usize,
    filtered: usize,
    scan_errors: usize,
    unavailable_roots: Vec<String>,
}

impl InventoryOutput {
    fn from_inventory(inventory: &Inventory) -> Self {
        Self {
            files: inventory
                .entries
                .iter()
                .map(|entry| InventoryFile {
                    source: entry.record.key.source_id.to_string(),
                    path: entry.record.display_path.clone(),
                    extension: entry.record.extension.clone(),
                    size: entry.record.size,
                    modified: entry.record.modified.format("%Y-%m-%d %H:%M").to_string(),
                    root: entry.root.clone(),
                })
                .collect(),
            total_bytes: inventory.total_bytes,
            files_seen: inventory.files_seen,
            duplicates: inventory.duplicates(),
            filtered: inventory
                .skipped
                .iter()
                .filter(|s| !matches!(s.reason, SkipReason::Duplicate { .. }))
                .count(),
            scan_errors: inventory.scan_errors.len(),
            unavailable_roots: inventory
                .warnings
                .iter()
                .map(|w| format!("{} ({})", w.root, w.reason))
                .collect(),
        }
    }
}

pub fn run(args: InventoryArgs) -> anyhow::Result<()> {
    let config = load_config(&args.config, &args.years)?;
    config
        .validate()
        .map_err(|e| HelpfulError::from_dossier(e, &args.config))?;

    let builder = InventoryBuilder::new(AdapterRegistry::with_local(), InventoryOptions::from_config(&config));
    let roots = config.resolved_roots();
    let inventory = runtime()?.block_on(builder.build(&roots, &NullProgress))?;
    let output = InventoryOutput::from_inventory(&inventory);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = output
        .files
        .iter()
        .map(|f| vec![f.path.clone(), format_size(f.size), f.modified.clone()])
        .collect();
    print_table(&["Path", "Size", "Modified"], rows);

    println!(
        "{} file(s), {} ({} listed, {} duplicate, {} filtered, {} unreadable)",
        output.files.len(),
        format_size(output.total_bytes),
        output.files_seen,
        output.duplicates,
        output.filtered,
        output.scan_errors
    );
    for root in &output.unavailable_roots {
        eprintln!("WARNING: search root unavailable: {}", root);
    }
    Ok(())
}
