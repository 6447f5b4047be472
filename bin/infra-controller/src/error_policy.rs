//! Per-object failure tracking for requeue backoff
//!
//! Failures are counted per object key so one failing object never slows
//! down the retries of another. A successful pass resets the count.

use infra_core::{CoreError, RequeuePolicy};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

#[derive(Default)]
pub struct FailureTracker {
    counts: Mutex<HashMap<String, u32>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure of `key` and compute its requeue delay
    pub fn requeue_after(&self, key: &str, err: &CoreError, policy: &RequeuePolicy) -> Duration {
        let retries = match self.counts.lock() {
            Ok(mut counts) => {
                let count = counts.entry(key.to_string()).or_insert(0);
                let retries = *count;
                *count = count.saturating_add(1);
                retries
            }
            Err(e) => {
                warn!("Failed to lock failure counts: {}, using initial backoff", e);
                0
            }
        };
        policy.requeue_after(err, retries)
    }

    /// Forget the failures of `key` after a successful pass
    pub fn reset(&self, key: &str) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.remove(key);
        }
    }

    #[cfg(test)]
    fn failures(&self, key: &str) -> u32 {
        self.counts
            .lock()
            .map(|c| c.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}
