//! Instrumentation seam for governed requests.

use std::time::Duration;

use dracin_common::Error;
use tracing::{debug, info, warn};

use super::queue::QueueStatus;

/// Receives every state transition of a governed request.
///
/// All methods default to no-ops so implementations pick what they need.
pub trait GovernorObserver: Send + Sync {
    /// An upstream attempt is about to be sent (`attempt` counts from 1).
    fn on_request(&self, _key: &str, _attempt: u32) {}

    fn on_cache_hit(&self, _key: &str) {}

    /// The call attached to an identical request already in flight.
    fn on_dedupe_join(&self, _key: &str) {}

    /// The call slept waiting for a rate-limit token.
    fn on_token_wait(&self, _key: &str, _waited: Duration) {}

    /// Upstream answered 429 or 503.
    fn on_rate_limited(&self, _key: &str, _status: u16, _retry_after: Option<Duration>) {}

    /// A retryable failure; the next attempt follows after `wait`.
    fn on_retry(&self, _key: &str, _attempt: u32, _wait: Duration, _error: &Error) {}

    fn on_success(&self, _key: &str, _attempts: u32, _elapsed: Duration) {}

    fn on_failure(&self, _key: &str, _attempts: u32, _error: &Error) {}

    /// Queue occupancy after a call obtained its execution slot.
    fn on_queue_status(&self, _status: QueueStatus) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl GovernorObserver for NoopObserver {}

/// Observer emitting structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GovernorObserver for TracingObserver {
    fn on_request(&self, key: &str, attempt: u32) {
        debug!(key, attempt, "Upstream request");
    }

    fn on_cache_hit(&self, key: &str) {
        debug!(key, "Cache hit");
    }

    fn on_dedupe_join(&self, key: &str) {
        debug!(key, "Joined in-flight request");
    }

    fn on_token_wait(&self, key: &str, waited: Duration) {
        debug!(key, waited_ms = waited.as_millis() as u64, "Waited for rate-limit token");
    }

    fn on_rate_limited(&self, key: &str, status: u16, retry_after: Option<Duration>) {
        warn!(
            key,
            status,
            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
            "Upstream rate limited"
        );
    }

    fn on_retry(&self, key: &str, attempt: u32, wait: Duration, error: &Error) {
        warn!(key, attempt, wait_ms = wait.as_millis() as u64, %error, "Retrying upstream request");
    }

    fn on_success(&self, key: &str, attempts: u32, elapsed: Duration) {
        info!(key, attempts, elapsed_ms = elapsed.as_millis() as u64, "Upstream request succeeded");
    }

    fn on_failure(&self, key: &str, attempts: u32, error: &Error) {
        warn!(key, attempts, %error, "Upstream request failed");
    }

    fn on_queue_status(&self, status: QueueStatus) {
        debug!(pending = status.pending, active = status.active, "Queue status");
    }
}
