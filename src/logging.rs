//! Structured logging setup.
//!
//! - File output: `{data_dir}/logs/pacs-voice.<date>.log`, rotated daily,
//!   latest 5 files kept.
//! - Console output on stderr (stdout carries IPC).
//! - `RUST_LOG` filter, default `info` with noisy HTTP internals at `warn`.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn,mio=warn";
const LOG_PREFIX: &str = "pacs-voice";
const MAX_LOG_FILES: usize = 5;

fn file_appender(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)?;
    Ok(appender)
}

/// Install the global subscriber. Fails if one is already installed.
///
/// If the log directory cannot be created, logging continues on stderr
/// only.
pub fn try_init(log_dir: &Path) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, file_error) = match file_appender(log_dir) {
        Ok(appender) => (
            Some(
                fmt::layer()
                    .with_writer(appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    match file_error {
        None => tracing::info!(log_dir = %log_dir.display(), "Logger initialized"),
        Some(e) => tracing::warn!(
            log_dir = %log_dir.display(),
            "File logging disabled: {e:#}"
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appender_creates_directory() {
        let dir = std::env::temp_dir()
            .join(format!("pacs-voice-logs-{}", uuid::Uuid::new_v4()))
            .join("nested");
        assert!(file_appender(&dir).is_ok());
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(dir.parent().unwrap());
    }
}
