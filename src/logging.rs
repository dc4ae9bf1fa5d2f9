use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Console-only subscriber for work done before the session log exists
pub fn console(level: Level) -> impl Subscriber + Send + Sync {
    fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .finish()
}

/// Installs the global subscriber: warnings and errors on stderr, `level`
/// and above in the session log at `log_path`.
pub fn init(log_path: &Path, level: Level) -> Result<()> {
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = File::create(log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(LevelFilter::WARN);
    let session = fmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_filter(LevelFilter::from_level(level));

    tracing_subscriber::registry()
        .with(stderr)
        .with(session)
        .try_init()
        .context("installing the log subscriber")
}
