//! Tracing setup. The TUI owns the terminal, so it logs to a file; the
//! one-shot subcommands log to stderr.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{self, LoggingSettings};

/// `ENCORE_LOG`, then `RUST_LOG`, then the configured level.
fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_env("ENCORE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Log to the configured file. Returns the path in use, or `None` when no
/// location could be determined (logging stays off).
pub fn init_file(settings: &LoggingSettings) -> Result<Option<PathBuf>> {
    let Some(path) = settings.file.clone().or_else(config::default_log_path) else {
        return Ok(None);
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(filter(settings))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(Some(path))
}

pub fn init_stderr(settings: &LoggingSettings) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(settings))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("installing tracing subscriber")
}
