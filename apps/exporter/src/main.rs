#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use logger::{LogOptions, init_tracing};
use smoketest_exporter::config::Config;
use smoketest_exporter::error::AppError;
use smoketest_exporter::metrics::PrometheusMetrics;
use smoketest_exporter::server;
use smoketest_exporter::smoketest::{ProcessRunner, ResultStore, Supervisor};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(version, about = "Runs smoketest commands and exports their outcomes as Prometheus metrics")]
struct Cli {
    /// Smoketest configuration (.toml or .json)
    #[arg(short, long)]
    config: PathBuf,

    /// Log file output, rotated daily
    #[arg(short = 'f', long)]
    log_file: Option<PathBuf>,

    /// Metrics port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,
}

/// `SERVICE_DEBUG=true` turns on debug logging
fn service_debug() -> bool {
    env::var("SERVICE_DEBUG").is_ok_and(|value| value == "true")
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let _log_guard =
        init_tracing(&LogOptions { file: cli.log_file.clone(), debug: service_debug() })?;
    if let Some(log_file) = &cli.log_file {
        info!("Logging to file: {}", log_file.display());
    }

    let config = Config::from_path(&cli.config)?;
    info!("Config file loaded successfully.");
    debug!("{config}");

    let addr = config.bind_addr(cli.port)?;

    let metrics = Arc::new(PrometheusMetrics::new(config.metric_namespace())?);
    let server = server::bind(metrics.clone(), addr)?;
    let server_handle = server.handle();
    let mut server_task = actix_web::rt::spawn(server);
    info!("Serving metrics on http://{addr}/metrics");

    let mut supervisor = Supervisor::new(
        Arc::new(ProcessRunner),
        ResultStore::new(),
        metrics,
        config.running_interval(),
    );
    supervisor.start(config.services());

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(AppError::from),
        served = &mut server_task => match served {
            Ok(served) => served.map_err(AppError::from),
            Err(e) => Err(AppError::Io(io::Error::other(e))),
        },
    };

    info!("Shutting down...");
    supervisor.shutdown().await;
    server_handle.stop(true).await;

    result
}
