//! Logging setup for zapgpt using tracing.
//!
//! Console output goes to stderr; a daily rolling file lands in the platform
//! data directory, or in `ZAPGPT_LOG_DIR` when set. `RUST_LOG` overrides the
//! default filter.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,zapgpt=debug";

const LOG_FILE_PREFIX: &str = "zapgpt.log";

/// Install the global subscriber. Keep the guard alive until exit so the
/// file writer flushes.
pub fn init() -> Result<WorkerGuard> {
    let log_dir = resolve_log_dir(|k| std::env::var(k).ok())?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Could not create log directory {}", log_dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Writing logs to {}", log_dir.display());
    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `ZAPGPT_LOG_DIR` if set, else `<data dir>/logs`.
fn resolve_log_dir<F>(lookup: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup("ZAPGPT_LOG_DIR").filter(|d| !d.trim().is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let dirs = directories::ProjectDirs::from("com", "zapgpt", "zapgpt")
        .context("Could not determine the data directory")?;
    Ok(dirs.data_dir().join("logs"))
}

/// Console-only logging captured by the test harness.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(fmt::layer().with_test_writer())
        .try_init();
}
