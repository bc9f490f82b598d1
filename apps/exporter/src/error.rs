use std::io::Error as IoError;
use std::net::AddrParseError;

use logger::LoggerError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the exporter at startup
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] AddrParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error(transparent)]
    Logger(#[from] LoggerError),
}
