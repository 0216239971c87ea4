//! Dossier command-line front end
//!
//! - `run`: inventory, analysis and report over the configured roots
//! - `inventory`: pass 1 only
//! - `rules`: validate and list a rule table
//! - `classify`: explain one local file

use clap::{Parser, Subcommand};
use dossier_logging::{init_logging, LogConfig};
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "dossier", version, about = "Discover and classify academic portfolio documents")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inventory, classify and report on every configured search root
    Run(cli::run::RunArgs),
    /// List the files a run would analyze
    Inventory(cli::inventory::InventoryArgs),
    /// Validate and list classification rules
    Rules(cli::rules::RulesArgs),
    /// Explain the classification of one file
    Classify(cli::classify::ClassifyArgs),
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => cli::run::run(args, cli.verbose),
        Commands::Inventory(args) => cli::inventory::run(args),
        Commands::Rules(args) => cli::rules::run(args),
        Commands::Classify(args) => cli::classify::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The progress bar owns the terminal during `run`.
    let quiet = matches!(cli.command, Commands::Run(_));
    if let Err(err) = init_logging(LogConfig {
        app_name: "dossier",
        verbose: cli.verbose,
        quiet,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<cli::error::HelpfulError>() {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("ERROR: {:#}", err),
            }
            ExitCode::from(1)
        }
    }
}
