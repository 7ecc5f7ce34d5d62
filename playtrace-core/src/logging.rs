//! Logging for the playtrace binaries
//!
//! Every binary writes to `~/.local/state/playtrace/playtrace.log.<date>`;
//! stdout stays reserved for command output.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_FILE_PREFIX: &str = "playtrace.log";

/// Keeps the background log writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the file subscriber under the XDG state directory.
///
/// `RUST_LOG` overrides `config.level` when set.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    init_in(&Config::state_dir(), config)
}

/// Install the file subscriber writing into `log_dir`.
///
/// Only the first subscriber in a process is kept. A later call still
/// returns a guard for its own writer, which then receives nothing.
pub fn init_in(log_dir: &Path, config: &LoggingConfig) -> Result<LoggingGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (writer, worker) = tracing_appender::non_blocking(rolling_appender(log_dir, config.max_files)?);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let installed = tracing_subscriber::registry()
        .with(level_filter(&config.level))
        .with(file_layer)
        .try_init();

    match installed {
        Ok(()) => tracing::info!(
            log_dir = %log_dir.display(),
            level = %config.level,
            "Logging initialized"
        ),
        Err(e) => tracing::debug!(
            log_dir = %log_dir.display(),
            error = %e,
            "Subscriber already installed, keeping it"
        ),
    }

    Ok(LoggingGuard { _worker: worker })
}

/// Log to the test writer so output shows up only for failing tests.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Daily rotation, at least one file kept.
fn rolling_appender(log_dir: &Path, max_files: usize) -> Result<RollingFileAppender> {
    Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file in {}: {}", log_dir.display(), e)))
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Base path of the log file; rotated files carry a date suffix.
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path();
        assert!(path.ends_with("playtrace/playtrace.log"));
    }

    #[test]
    fn test_init_twice_keeps_first_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("state/playtrace");
        let config = LoggingConfig::default();

        let first = init_in(&log_dir, &config);
        assert!(first.is_ok());
        assert!(log_dir.is_dir());

        let second = init_in(&log_dir, &config);
        assert!(second.is_ok());
    }

    #[test]
    fn test_zero_max_files_still_builds() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rolling_appender(dir.path(), 0).is_ok());
    }
}
