use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

/// Route the `log` facade into an append-only file. The terminal belongs to
/// the TUI, so nothing may be written to stdout or stderr while it runs.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(log_path: &Path, level: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .try_init()
        .context("failed to initialise logger")?;
    Ok(())
}
