use std::collections::BTreeMap;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fmt, fs, io};

use serde::Deserialize;
use thiserror::Error;

use crate::smoketest::ServiceConfig;

/// Seconds between the end of one smoketest and the start of the next
pub const DEFAULT_RUNNING_INTERVAL: u64 = 180;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9111;

const MIN_RUNNING_INTERVAL: u64 = 1;
const MAX_RUNNING_INTERVAL: u64 = 86400; // 24 hours
const MIN_TIMEOUT: u64 = 1;
const MAX_TIMEOUT: u64 = 3600; // 1 hour

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported config format for {0:?}: expected .toml or .json")]
    UnsupportedFormat(PathBuf),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generic: Generic,
    #[serde(default)]
    pub exporter: Exporter,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Generic {
    /// Seconds to sleep after each smoketest
    #[serde(default = "default_running_interval")]
    pub running_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Exporter {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional prefix for every metric name
    #[serde(default)]
    pub metric_namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Timeout in seconds
    pub timeout: u64,
}

fn default_running_interval() -> u64 {
    DEFAULT_RUNNING_INTERVAL
}

fn default_bind() -> String {
    DEFAULT_BIND.into()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for Generic {
    fn default() -> Self {
        Self { running_interval: DEFAULT_RUNNING_INTERVAL }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self { bind: DEFAULT_BIND.into(), port: DEFAULT_PORT, metric_namespace: None }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_title_2 = write_title_indented(2);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Smoketest Configuration:")?;
        write_title_1(f, "Generic")?;
        write_1(f, "Running Interval (s)", &self.generic.running_interval)?;
        write_title_1(f, "Exporter")?;
        write_1(f, "Bind Address", &self.exporter.bind)?;
        write_1(f, "Port", &self.exporter.port)?;
        write_1(f, "Metric Namespace", &self.exporter.metric_namespace.as_deref().unwrap_or("-"))?;
        write_title_1(f, "Services")?;
        for (name, service) in &self.services {
            write_title_2(f, name)?;
            write_2(f, "Command", &service.command.join(" "))?;
            write_2(f, "Timeout (s)", &service.timeout)?;
        }

        Ok(())
    }
}

impl Config {
    /// Load and validate a config file. The format follows the extension:
    /// `.toml` or `.json`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();

        let parse: fn(&str) -> Result<Self, ConfigError> = match extension {
            "toml" => Self::from_toml_str,
            "json" => Self::from_json_str,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let raw_string = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFailed { path: path.to_path_buf(), source })?;
        parse(&raw_string)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::Invalid("no services configured".into()));
        }

        validate_running_interval(self.generic.running_interval)?;

        for (name, service) in &self.services {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("service name must not be empty".into()));
            }
            validate_command(name, &service.command)?;
            validate_timeout(name, service.timeout)?;
        }

        Ok(())
    }

    pub fn running_interval(&self) -> Duration {
        Duration::from_secs(self.generic.running_interval)
    }

    /// Address for the metrics endpoint; `port` overrides the configured one.
    /// `bind` is a bare IP, so IPv6 addresses such as `::` need no brackets.
    pub fn bind_addr(&self, port: Option<u16>) -> Result<SocketAddr, AddrParseError> {
        let ip: IpAddr = self.exporter.bind.parse()?;
        Ok(SocketAddr::new(ip, port.unwrap_or(self.exporter.port)))
    }

    pub fn metric_namespace(&self) -> Option<&str> {
        self.exporter.metric_namespace.as_deref().filter(|namespace| !namespace.is_empty())
    }

    /// Immutable per-service settings, ordered by service name
    pub fn services(&self) -> Vec<ServiceConfig> {
        self.services
            .iter()
            .map(|(name, service)| ServiceConfig {
                name: name.clone(),
                command: service.command.clone(),
                timeout: Duration::from_secs(service.timeout),
            })
            .collect()
    }
}

fn validate_command(name: &str, command: &[String]) -> Result<(), ConfigError> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::Invalid(format!("service {name}: command must name a program"))),
    }
}

fn validate_running_interval(interval_seconds: u64) -> Result<(), ConfigError> {
    if !(MIN_RUNNING_INTERVAL..=MAX_RUNNING_INTERVAL).contains(&interval_seconds) {
        return Err(ConfigError::Invalid(format!(
            "running_interval {interval_seconds}s out of range ({MIN_RUNNING_INTERVAL}-{MAX_RUNNING_INTERVAL})"
        )));
    }
    Ok(())
}

fn validate_timeout(name: &str, timeout_seconds: u64) -> Result<(), ConfigError> {
    if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&timeout_seconds) {
        return Err(ConfigError::Invalid(format!(
            "service {name}: timeout {timeout_seconds}s out of range ({MIN_TIMEOUT}-{MAX_TIMEOUT})"
        )));
    }
    Ok(())
}
