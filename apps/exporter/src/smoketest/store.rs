use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::types::TestOutcome;

/// Latest smoketest outcome per service
///
/// Outcomes are replaced as a whole under the lock, so readers never see
/// fields from two different cycles. Cloning the store shares the map.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    outcomes: Arc<RwLock<HashMap<String, TestOutcome>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest outcome for `service`, `None` until its first cycle completes
    pub async fn get(&self, service: &str) -> Option<TestOutcome> {
        self.outcomes.read().await.get(service).cloned()
    }

    /// Replace the outcome for `service`
    pub async fn set(&self, service: &str, outcome: TestOutcome) {
        self.record(service, outcome, |_| {}).await;
    }

    /// Replace the outcome for `service` and run `publish` while the write
    /// guard is still held, so published values always match the stored one.
    pub async fn record<F>(&self, service: &str, outcome: TestOutcome, publish: F)
    where
        F: FnOnce(&TestOutcome),
    {
        let mut outcomes = self.outcomes.write().await;
        publish(&outcome);
        outcomes.insert(service.to_string(), outcome);
    }

    /// Consistent copy of every stored outcome, ordered by service name
    pub async fn snapshot(&self) -> BTreeMap<String, TestOutcome> {
        self.outcomes
            .read()
            .await
            .iter()
            .map(|(service, outcome)| (service.clone(), outcome.clone()))
            .collect()
    }
}
