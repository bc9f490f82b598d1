use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::smoketest::TestOutcome;

/// Destination for smoketest metric updates. Publishing is fire-and-forget:
/// implementations log their own failures and never block the caller.
pub trait MetricsSink: Send + Sync {
    fn publish_outcome(&self, service: &str, outcome: &TestOutcome);
    fn set_exporter_status(&self, up: bool);
}

/// Prometheus gauges exposed on `/metrics`
pub struct PrometheusMetrics {
    registry: Registry,

    pub success: GaugeVec,
    pub slowness: GaugeVec,
    pub duration: GaugeVec,
    pub exporter_status: Gauge,
}

impl PrometheusMetrics {
    /// Registers all gauges. `namespace` prefixes every metric name, e.g.
    /// `metric` yields `metric_smoketest_success`.
    pub fn new(namespace: Option<&str>) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let success = GaugeVec::new(
            opts(namespace, "smoketest_success", "Service success status"),
            &["service"],
        )?;
        registry.register(Box::new(success.clone()))?;

        let slowness = GaugeVec::new(
            opts(namespace, "smoketest_slowness", "Service slowness status"),
            &["service"],
        )?;
        registry.register(Box::new(slowness.clone()))?;

        let duration = GaugeVec::new(
            opts(namespace, "smoketest_duration", "Service smoketest duration in milliseconds"),
            &["service"],
        )?;
        registry.register(Box::new(duration.clone()))?;

        let exporter_status = Gauge::with_opts(opts(
            namespace,
            "smoketest_exporter_status",
            "Status of the smoketest exporter",
        ))?;
        registry.register(Box::new(exporter_status.clone()))?;

        Ok(Self { registry, success, slowness, duration, exporter_status })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsSink for PrometheusMetrics {
    fn publish_outcome(&self, service: &str, outcome: &TestOutcome) {
        set_labelled(&self.success, service, outcome.success_value());
        set_labelled(&self.slowness, service, outcome.slowness_value());
        set_labelled(&self.duration, service, outcome.duration_ms as f64);
    }

    fn set_exporter_status(&self, up: bool) {
        self.exporter_status.set(if up { 1.0 } else { 0.0 });
    }
}

fn opts(namespace: Option<&str>, name: &str, help: &str) -> Opts {
    let opts = Opts::new(name, help);
    match namespace {
        Some(namespace) if !namespace.is_empty() => opts.namespace(namespace),
        _ => opts,
    }
}

fn set_labelled(gauge: &GaugeVec, service: &str, value: f64) {
    match gauge.get_metric_with_label_values(&[service]) {
        Ok(gauge) => gauge.set(value),
        Err(e) => warn!(service, "Failed to publish smoketest metric: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_outcome_sets_gauges() {
        let metrics = PrometheusMetrics::new(None).unwrap();

        metrics.publish_outcome("auth", &TestOutcome::timeout("auth", 3000));

        assert_eq!(metrics.success.with_label_values(&["auth"]).get(), 0.0);
        assert_eq!(metrics.slowness.with_label_values(&["auth"]).get(), 1.0);
        assert_eq!(metrics.duration.with_label_values(&["auth"]).get(), 3000.0);

        metrics.publish_outcome("auth", &TestOutcome::success("auth", 25));

        assert_eq!(metrics.success.with_label_values(&["auth"]).get(), 1.0);
        assert_eq!(metrics.slowness.with_label_values(&["auth"]).get(), 0.0);
        assert_eq!(metrics.duration.with_label_values(&["auth"]).get(), 25.0);
    }

    #[test]
    fn test_encode_uses_compatible_names() {
        let metrics = PrometheusMetrics::new(None).unwrap();
        metrics.publish_outcome("auth", &TestOutcome::success("auth", 25));
        metrics.set_exporter_status(true);

        let text = metrics.encode().unwrap();

        assert!(text.contains("smoketest_success{service=\"auth\"} 1"));
        assert!(text.contains("smoketest_slowness{service=\"auth\"} 0"));
        assert!(text.contains("smoketest_duration{service=\"auth\"} 25"));
        assert!(text.contains("smoketest_exporter_status 1"));
    }

    #[test]
    fn test_namespace_prefix() {
        let metrics = PrometheusMetrics::new(Some("metric")).unwrap();
        metrics.publish_outcome("db", &TestOutcome::success("db", 1));

        let text = metrics.encode().unwrap();

        assert!(text.contains("metric_smoketest_success{service=\"db\"} 1"));
        assert!(text.contains("metric_smoketest_exporter_status 0"));
    }
}
