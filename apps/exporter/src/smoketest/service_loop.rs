use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use super::classifier::classify;
use super::runner::{CommandRunner, RunReport};
use super::store::ResultStore;
use super::types::{ServiceConfig, TestOutcome};
use crate::metrics::MetricsSink;

/// Periodic smoketest for a single service
///
/// Each cycle runs the command, turns the report into a [`TestOutcome`],
/// stores and publishes it, then sleeps for the running interval. The period
/// is therefore run time plus interval.
pub struct ServiceLoop {
    service: ServiceConfig,
    runner: Arc<dyn CommandRunner>,
    store: ResultStore,
    metrics: Arc<dyn MetricsSink>,
    interval: Duration,
    span: Span,
}

impl ServiceLoop {
    pub fn new(
        service: ServiceConfig,
        runner: Arc<dyn CommandRunner>,
        store: ResultStore,
        metrics: Arc<dyn MetricsSink>,
        interval: Duration,
    ) -> Self {
        let span = info_span!("smoketest", service = %service.name);
        Self { service, runner, store, metrics, interval, span }
    }

    /// Run cycles until `cancel` fires. A command still running at that point
    /// is killed.
    pub async fn run(self, cancel: CancellationToken) {
        let span = self.span.clone();

        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.run_cycle() => {}
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.interval) => {}
                }
            }

            debug!("Smoketest loop stopped");
        }
        .instrument(span)
        .await
    }

    /// Execute one smoketest and record its outcome
    pub async fn run_cycle(&self) -> TestOutcome {
        let report = self.runner.run(&self.service.command, self.service.timeout).await;
        let outcome = self.evaluate(report);

        self.store
            .record(&self.service.name, outcome.clone(), |outcome| {
                self.metrics.publish_outcome(&self.service.name, outcome);
            })
            .await;

        if outcome.success {
            info!(duration_ms = outcome.duration_ms, "{}", outcome.message);
        } else {
            warn!(
                duration_ms = outcome.duration_ms,
                timed_out = outcome.timed_out,
                "{}",
                outcome.message
            );
        }

        outcome
    }

    fn evaluate(&self, report: RunReport) -> TestOutcome {
        let name = &self.service.name;

        if report.completed {
            TestOutcome::success(name, report.elapsed_ms)
        } else if report.timed_out {
            TestOutcome::timeout(name, report.elapsed_ms)
        } else {
            debug!(stderr = %report.stderr.trim(), "Smoketest command failed");
            TestOutcome::failure(classify(name, &report.stderr), report.elapsed_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PrometheusMetrics;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned reports, one per call
    struct ScriptedRunner {
        reports: Mutex<VecDeque<RunReport>>,
    }

    impl ScriptedRunner {
        fn new(reports: Vec<RunReport>) -> Self {
            Self { reports: Mutex::new(reports.into()) }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, _command: &[String], _limit: Duration) -> RunReport {
            self.reports
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| RunReport::completed(1))
        }
    }

    fn service(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            command: vec!["true".to_string()],
            timeout: Duration::from_secs(5),
        }
    }

    fn service_loop(
        runner: ScriptedRunner,
        store: ResultStore,
        metrics: Arc<PrometheusMetrics>,
        interval: Duration,
    ) -> ServiceLoop {
        ServiceLoop::new(service("auth"), Arc::new(runner), store, metrics, interval)
    }

    #[tokio::test]
    async fn test_cycle_outcomes() {
        let runner = ScriptedRunner::new(vec![
            RunReport::completed(12),
            RunReport::timed_out(5000),
            RunReport::failed("connect: Connection refused".into(), 3),
            RunReport::failed("exit status 2".into(), 4),
        ]);
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let service_loop =
            service_loop(runner, ResultStore::new(), metrics, Duration::from_secs(1));

        let outcome = service_loop.run_cycle().await;
        assert_eq!(outcome, TestOutcome::success("auth", 12));

        let outcome = service_loop.run_cycle().await;
        assert_eq!(outcome, TestOutcome::timeout("auth", 5000));

        let outcome = service_loop.run_cycle().await;
        assert!(!outcome.success && !outcome.timed_out);
        assert_eq!(outcome.message, "Smoketest command is unable to connect to service: auth");
        assert_eq!(outcome.duration_ms, 3);

        let outcome = service_loop.run_cycle().await;
        assert_eq!(outcome.message, "auth smoketest command has been failed.");
    }

    #[tokio::test]
    async fn test_cycle_stores_and_publishes() {
        let runner = ScriptedRunner::new(vec![RunReport::timed_out(800), RunReport::completed(20)]);
        let store = ResultStore::new();
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let service_loop =
            service_loop(runner, store.clone(), metrics.clone(), Duration::from_secs(1));

        service_loop.run_cycle().await;
        assert_eq!(store.get("auth").await, Some(TestOutcome::timeout("auth", 800)));
        assert_eq!(metrics.slowness.with_label_values(&["auth"]).get(), 1.0);

        service_loop.run_cycle().await;
        assert_eq!(store.get("auth").await, Some(TestOutcome::success("auth", 20)));
        assert_eq!(metrics.success.with_label_values(&["auth"]).get(), 1.0);
        assert_eq!(metrics.slowness.with_label_values(&["auth"]).get(), 0.0);
        assert_eq!(metrics.duration.with_label_values(&["auth"]).get(), 20.0);
    }

    #[tokio::test]
    async fn test_loop_repeats_after_interval() {
        let runner = ScriptedRunner::new(vec![RunReport::timed_out(1), RunReport::completed(2)]);
        let store = ResultStore::new();
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let service_loop =
            service_loop(runner, store.clone(), metrics, Duration::from_millis(50));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(service_loop.run(cancel.clone()));

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.get("auth").await != Some(TestOutcome::success("auth", 2)) {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("second cycle never completed");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let runner = ScriptedRunner::new(vec![]);
        let store = ResultStore::new();
        let metrics = Arc::new(PrometheusMetrics::new(None).unwrap());
        let service_loop =
            service_loop(runner, store.clone(), metrics, Duration::from_secs(3600));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(service_loop.run(cancel.clone()));

        while store.get("auth").await.is_none() {
            sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop ignored cancellation")
            .unwrap();
    }
}
