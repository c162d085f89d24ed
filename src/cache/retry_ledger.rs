use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use crate::{logging::logger, storage::KeyValueStore};

pub const LEDGER_KEY: &str = "catalog-population";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct LedgerState {
    #[serde(default)]
    failures: BTreeMap<String, u32>,
    #[serde(default, rename = "initialComplete")]
    initial_complete: bool,
}

/// Persisted per-country failure counters and the initial population flag.
/// Write failures are logged and otherwise ignored; the counters are advisory.
pub struct RetryLedger {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<LedgerState>,
}

impl RetryLedger {
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let state = match store.load(LEDGER_KEY).await {
            Ok(Some(raw)) => serde_json::from_value(raw).unwrap_or_else(|error| {
                logger().warn(
                    "cache.ledger_invalid",
                    json!({ "error": error.to_string() }),
                );
                LedgerState::default()
            }),
            Ok(None) => LedgerState::default(),
            Err(error) => {
                logger().warn(
                    "cache.ledger_unreadable",
                    json!({ "error": format!("{error:#}") }),
                );
                LedgerState::default()
            }
        };
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    pub async fn failures(&self, country: &str) -> u32 {
        self.state
            .lock()
            .await
            .failures
            .get(country)
            .copied()
            .unwrap_or(0)
    }

    pub async fn record_success(&self, country: &str) {
        let mut state = self.state.lock().await;
        if state.failures.remove(country).is_some() {
            self.persist(&state).await;
        }
    }

    /// Returns the counter after the increment.
    pub async fn record_failure(&self, country: &str) -> u32 {
        let mut state = self.state.lock().await;
        let count = state.failures.entry(country.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;
        self.persist(&state).await;
        count
    }

    /// Countries that failed before but have not yet hit `max_attempts`.
    pub async fn retryable(&self, max_attempts: u32) -> Vec<String> {
        self.state
            .lock()
            .await
            .failures
            .iter()
            .filter(|(_, count)| **count > 0 && **count < max_attempts)
            .map(|(country, _)| country.clone())
            .collect()
    }

    pub async fn initial_complete(&self) -> bool {
        self.state.lock().await.initial_complete
    }

    pub async fn mark_initial_complete(&self) {
        let mut state = self.state.lock().await;
        state.initial_complete = true;
        self.persist(&state).await;
    }

    async fn persist(&self, state: &LedgerState) {
        let result = match serde_json::to_value(state) {
            Ok(value) => self.store.save(LEDGER_KEY, &value).await,
            Err(error) => Err(error.into()),
        };
        if let Err(error) = result {
            logger().warn(
                "cache.ledger_write_failed",
                json!({ "error": format!("{error:#}") }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn counters_survive_reopen() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let ledger = RetryLedger::open(store.clone()).await;
        assert_eq!(ledger.record_failure("de").await, 1);
        assert_eq!(ledger.record_failure("de").await, 2);
        ledger.record_failure("fr").await;
        ledger.mark_initial_complete().await;

        let reopened = RetryLedger::open(store).await;
        assert_eq!(reopened.failures("de").await, 2);
        assert!(reopened.initial_complete().await);
    }

    #[tokio::test]
    async fn success_resets_and_cap_excludes() {
        let ledger = RetryLedger::open(Arc::new(MemoryStore::new())).await;
        for _ in 0..5 {
            ledger.record_failure("it").await;
        }
        ledger.record_failure("es").await;
        ledger.record_failure("nl").await;
        ledger.record_success("nl").await;

        assert_eq!(ledger.failures("nl").await, 0);
        assert_eq!(ledger.retryable(5).await, vec!["es"]);
    }

    #[tokio::test]
    async fn garbage_state_starts_fresh() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.save(LEDGER_KEY, &json!("garbage")).await.unwrap();
        let ledger = RetryLedger::open(store).await;
        assert!(!ledger.initial_complete().await);
    }
}
