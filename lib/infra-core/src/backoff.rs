//! Requeue policy for reconcile passes

use rand::Rng;
use std::time::Duration;

use crate::error::CoreError;

/// How long to wait before the next pass over an object
#[derive(Clone, Debug)]
pub struct RequeuePolicy {
    /// Periodic resync of healthy objects
    pub sync_period: Duration,
    /// First backoff after a retryable failure
    pub initial_backoff: Duration,
    /// Upper bound of the exponential backoff
    pub max_backoff: Duration,
    /// Requeue after a fatal failure, which only a spec change can fix
    pub fatal_requeue: Duration,
    /// Poll interval while an external resource is being deleted
    pub deletion_poll: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            sync_period: Duration::from_secs(60),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(300),
            fatal_requeue: Duration::from_secs(900),
            deletion_poll: Duration::from_secs(5),
        }
    }
}

impl RequeuePolicy {
    /// Exponential backoff for the given retry count, capped at `max_backoff`
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let exponential = 2u64.saturating_pow(retry_count);
        let backoff_ms = base
            .saturating_mul(exponential)
            .min(self.max_backoff.as_millis() as u64);
        Duration::from_millis(backoff_ms)
    }

    /// Requeue delay after `err` on the `retry_count`-th consecutive failure
    pub fn requeue_after(&self, err: &CoreError, retry_count: u32) -> Duration {
        if err.is_fatal() {
            return self.fatal_requeue;
        }
        jitter(self.backoff_duration(retry_count))
    }
}

/// Spread retries of objects failing together by up to +-50%
fn jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.5);
    delay.mul_f64(factor)
}
