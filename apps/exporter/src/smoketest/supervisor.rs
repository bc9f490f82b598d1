use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::runner::CommandRunner;
use super::service_loop::ServiceLoop;
use super::store::ResultStore;
use super::types::ServiceConfig;
use crate::metrics::MetricsSink;

/// Owns one [`ServiceLoop`] task per configured service
pub struct Supervisor {
    runner: Arc<dyn CommandRunner>,
    store: ResultStore,
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Create a supervisor; no loop runs until [`Supervisor::start`]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        store: ResultStore,
        metrics: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        Self {
            runner,
            store,
            metrics,
            interval,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn the loop for a single service
    pub fn schedule_service(&mut self, service: ServiceConfig) {
        info!("running {} smoketest", service.name);

        let service_loop = ServiceLoop::new(
            service,
            self.runner.clone(),
            self.store.clone(),
            self.metrics.clone(),
            self.interval,
        );

        self.tasks.push(tokio::spawn(service_loop.run(self.cancel.child_token())));
    }

    /// Spawn one loop per service, then report the exporter as up
    pub fn start(&mut self, services: Vec<ServiceConfig>) {
        for service in services {
            self.schedule_service(service);
        }

        self.metrics.set_exporter_status(true);
        info!(services = self.tasks.len(), "Smoketest exporter is running");
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Number of loops spawned so far
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Token observed by every loop; cancelling it stops them all
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every loop and wait for them to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Smoketest loop ended abnormally: {}", e);
            }
        }

        info!("All smoketest loops stopped");
    }
}
