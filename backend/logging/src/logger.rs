//! Structured Logger
//!
//! Console output plus an optional daily-rolling NDJSON file. `RUST_LOG`
//! overrides the configured level.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "herald.log";

/// Install the global subscriber. Without `log_dir` only the console layer
/// is installed. A second call leaves the first subscriber in place.
pub fn init_logger(log_dir: Option<&Path>, level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    // `herald.log.YYYY-MM-DD`
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            Some(fmt::layer().json().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_directory() {
        let dir = std::env::temp_dir().join(format!("herald-logs-{}", std::process::id()));
        init_logger(Some(&dir), "debug").unwrap();
        assert!(dir.is_dir());
        // Installing twice is harmless.
        init_logger(None, "info").unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
