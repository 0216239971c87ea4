//! CLI module for dossier
//!
//! Each subcommand lives in its own module with an `Args` struct and a
//! synchronous `run` entry point; async work runs on a runtime built per
//! command.

pub mod classify;
pub mod error;
pub mod inventory;
pub mod output;
pub mod rules;
pub mod run;

use crate::cli::error::HelpfulError;
use dossier::{AppConfig, DossierError, RuleError, RuleTable};
use std::path::Path;

/// Load a config file and apply `--year` overrides.
pub fn load_config(path: &Path, years: &[i32]) -> anyhow::Result<AppConfig> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let mut config = AppConfig::load(path).map_err(|e| HelpfulError::invalid_config(path, &e.to_string()))?;
    if !years.is_empty() {
        config.years = Some(years.iter().copied().collect());
    }
    Ok(config)
}

/// Rule table from `path`, or the built-in matrix when none is given.
pub fn load_rules(path: Option<&Path>) -> anyhow::Result<(RuleTable, Vec<RuleError>)> {
    match path {
        None => Ok((RuleTable::builtin(), Vec::new())),
        Some(path) => RuleTable::load(path).map_err(|e| match e {
            DossierError::RuleTableLoad { path, reason } => HelpfulError::rule_table(&path, &reason).into(),
            other => anyhow::Error::from(other),
        }),
    }
}

/// Rejected rules go to stderr; the run continues with the rest.
pub fn print_rule_errors(errors: &[RuleError]) {
    for error in errors {
        eprintln!("WARNING: rule rejected: {}", error);
    }
}

/// Multi-threaded runtime for commands that walk or fetch.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}
