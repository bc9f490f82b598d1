use std::time::Duration;

/// One monitored service, as loaded from the configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Unique service name, used as the `service` metric label
    pub name: String,

    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Upper bound for a single smoketest run
    pub timeout: Duration,
}

/// Latest outcome of a smoketest run
///
/// Outcomes are only built through [`TestOutcome::success`],
/// [`TestOutcome::timeout`] and [`TestOutcome::failure`], so `success` and
/// `timed_out` are never both set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    /// Whether the command exited with status zero within its timeout
    pub success: bool,

    /// Whether the command was killed for exceeding its timeout
    pub timed_out: bool,

    /// Wall-clock run time in milliseconds, measured for every outcome
    pub duration_ms: u64,

    /// Human-readable summary, never empty
    pub message: String,
}

impl TestOutcome {
    /// The command exited with status zero within its timeout
    pub fn success(service: &str, duration_ms: u64) -> Self {
        Self {
            success: true,
            timed_out: false,
            duration_ms,
            message: format!("{service} smoketest is successful in {duration_ms} ms."),
        }
    }

    /// The command was killed after its timeout elapsed
    pub fn timeout(service: &str, duration_ms: u64) -> Self {
        Self {
            success: false,
            timed_out: true,
            duration_ms,
            message: format!("{service} smoketest timed out."),
        }
    }

    /// The command exited non-zero or could not be launched
    pub fn failure(message: String, duration_ms: u64) -> Self {
        Self { success: false, timed_out: false, duration_ms, message }
    }

    /// Gauge value for `smoketest_success`
    pub fn success_value(&self) -> f64 {
        if self.success { 1.0 } else { 0.0 }
    }

    /// Gauge value for `smoketest_slowness`
    pub fn slowness_value(&self) -> f64 {
        if self.timed_out { 1.0 } else { 0.0 }
    }
}
