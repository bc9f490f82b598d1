use std::env::var;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// ISO-8601 UTC with microsecond precision, e.g. `2024-05-01T12:00:00.123456Z`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Rotated log files kept next to the active one.
const MAX_LOG_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Failed to open log file: {0}")]
    File(#[from] InitError),
    #[error("Log file path has no file name: {0}")]
    InvalidPath(PathBuf),
    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Also write log lines to this file (rotated daily).
    pub file: Option<PathBuf>,
    /// Lower the default level to `debug` when `RUST_LOG` is unset.
    pub debug: bool,
}

/// Keeps the background file writer alive; dropping it flushes pending lines.
#[derive(Debug, Default)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize tracing with console output and an optional rolling log file.
pub fn init_tracing(options: &LogOptions) -> Result<LogGuard, LoggerError> {
    let level = if options.debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let console_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_timer(timestamp()).boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_timer(timestamp()).boxed(),
    };

    let (file_layer, file_guard) = match &options.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling_appender(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timestamp())
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LogGuard { _file: file_guard })
}

fn timestamp() -> ChronoUtc {
    ChronoUtc::new(TIMESTAMP_FORMAT.to_string())
}

fn rolling_appender(path: &Path) -> Result<RollingFileAppender, LoggerError> {
    let (directory, file_name) = split_log_path(path)?;

    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(MAX_LOG_FILES)
        .build(directory)?)
}

/// Splits `dir/name.log` into the appender's directory and file prefix.
fn split_log_path(path: &Path) -> Result<(PathBuf, String), LoggerError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| LoggerError::InvalidPath(path.to_path_buf()))?;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok((directory, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/exporter.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, "exporter.log");

        let (dir, name) = split_log_path(Path::new("exporter.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "exporter.log");

        assert!(matches!(
            split_log_path(Path::new("/")),
            Err(LoggerError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_rolling_appender_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("logs").join("exporter.log");

        let _appender = rolling_appender(&path).unwrap();
        assert!(temp_dir.path().join("logs").is_dir());
    }
}
