//! Shared logging setup for the dossier binary.
//!
//! One `tracing` registry, two layers: a daily log file under
//! `$DOSSIER_HOME/logs` (last few days kept) and stderr. `RUST_LOG` drives
//! the file filter.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "dossier=info";
const KEPT_LOG_FILES: usize = 5;

/// Logging options for a dossier process.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr (info/debug visible).
    pub verbose: bool,
    /// A progress bar owns the terminal; only warnings go to stderr.
    pub quiet: bool,
}

pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir()?;
    let file_writer = log_file_appender(&log_dir, config.app_name)?;

    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = console_filter(&config, &file_filter);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(())
}

fn console_filter(config: &LogConfig<'_>, file_filter: &EnvFilter) -> EnvFilter {
    if config.verbose {
        file_filter.clone()
    } else if config.quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::new("dossier=warn")
    }
}

/// Daily `<app>.<date>.log` files, oldest pruned past [`KEPT_LOG_FILES`].
fn log_file_appender(dir: &Path, app_name: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_prefix(app_name))
        .filename_suffix("log")
        .max_log_files(KEPT_LOG_FILES)
        .build(dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))
}

fn file_prefix(app_name: &str) -> String {
    let prefix: String = app_name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
        .collect();
    if prefix.is_empty() {
        "dossier".to_string()
    } else {
        prefix
    }
}

/// Dossier home directory: `$DOSSIER_HOME` or `~/.dossier`.
pub fn dossier_home() -> PathBuf {
    if let Ok(home) = std::env::var("DOSSIER_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".dossier")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = dossier_home().join("logs");
    fs::create_dir_all(&logs).with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_file_prefix() {
        assert_eq!(file_prefix("dossier"), "dossier");
        assert_eq!(file_prefix("dossier run/1"), "dossier_run_1");
        assert_eq!(file_prefix(""), "dossier");
    }

    #[test]
    fn test_console_filter_follows_flags() {
        let file = EnvFilter::new("dossier=debug");
        let verbose = LogConfig {
            app_name: "dossier",
            verbose: true,
            quiet: true,
        };
        assert_eq!(console_filter(&verbose, &file).to_string(), "dossier=debug");

        let quiet = LogConfig {
            app_name: "dossier",
            verbose: false,
            quiet: true,
        };
        assert_eq!(console_filter(&quiet, &file).to_string(), "warn");
    }

    #[test]
    fn test_appender_writes_into_log_dir() {
        let dir = TempDir::new().unwrap();
        let mut appender = log_file_appender(dir.path(), "dossier").unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("dossier."));
        assert!(names[0].ends_with(".log"));
    }
}
