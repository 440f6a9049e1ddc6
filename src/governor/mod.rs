//! Request governor wrapping every outbound upstream call.
//!
//! A governed call walks this path:
//!
//! 1. **Cache**: a live cached response is returned immediately, bypassing
//!    every limit below.
//! 2. **De-duplication**: a call whose key is already in flight attaches to
//!    that execution instead of issuing its own.
//! 3. **Queue**: at most `max_concurrent` executions run at once; at most
//!    `max_queue` wait, further calls fail with [`Error::QueueOverflow`].
//! 4. **Token bucket**: each attempt spends one token, waiting for refill.
//! 5. **Execution** with a per-attempt timeout, then retry with backoff for
//!    retryable failures (`Retry-After` honored on 429/503).
//!
//! The queue slot is held for the whole logical request, retries included.
//! Each execution runs on its own task, so a caller that stops waiting
//! neither cancels the upstream call nor leaves its slot occupied.
//!
//! # Example
//!
//! ```rust,ignore
//! let governor = Governor::new(GovernorConfig::default())?;
//! let body = governor
//!     .fetch_json(OutboundRequest::get("https://api.example/trending"))
//!     .await?;
//! ```

pub mod backoff;
pub mod bucket;
pub mod cache;
pub mod observer;
pub mod queue;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use bucket::TokenBucket;
pub use cache::ResponseCache;
pub use observer::{GovernorObserver, NoopObserver, TracingObserver};
pub use queue::{QueueStatus, RequestQueue};
pub use transport::{OutboundRequest, RawResponse, ReqwestTransport, Transport};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dracin_common::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use crate::config::GovernorConfig;

/// Maximum number of upstream body bytes kept in an error detail.
const ERROR_DETAIL_LIMIT: usize = 500;

type SharedResponse = Shared<BoxFuture<'static, Result<Arc<Value>>>>;

/// Cheaply cloneable handle to one governor.
///
/// Construct one per process and pass it to every adapter.
#[derive(Clone)]
pub struct Governor {
    inner: Arc<GovernorInner>,
}

struct GovernorInner {
    config: GovernorConfig,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn GovernorObserver>,
    bucket: TokenBucket,
    queue: RequestQueue,
    cache: ResponseCache,
    backoff: BackoffPolicy,
    in_flight: Mutex<HashMap<String, SharedResponse>>,
}

/// A failed attempt plus the delay the upstream asked for, if any.
struct AttemptFailure {
    error: Error,
    retry_after: Option<Duration>,
}

impl From<Error> for AttemptFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl Governor {
    /// Governor sending over `reqwest`, logging through `tracing`.
    pub fn new(config: GovernorConfig) -> Result<Self> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(TracingObserver),
        ))
    }

    pub fn with_transport(config: GovernorConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_parts(config, transport, Arc::new(TracingObserver))
    }

    pub fn with_parts(
        config: GovernorConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn GovernorObserver>,
    ) -> Self {
        let inner = GovernorInner {
            bucket: TokenBucket::new(config.capacity(), config.requests_per_minute),
            queue: RequestQueue::new(config.max_concurrent, config.max_queue),
            cache: ResponseCache::new(config.cache_ttl(), config.cache_prune_threshold),
            backoff: BackoffPolicy::from_config(&config),
            in_flight: Mutex::new(HashMap::new()),
            config,
            transport,
            observer,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Fetch and decode a JSON body under governance.
    pub async fn fetch_json(&self, request: OutboundRequest) -> Result<Arc<Value>> {
        let key = request.key().to_string();

        if request.cacheable {
            if let Some(body) = self.inner.cache.get(&key) {
                self.inner.observer.on_cache_hit(&key);
                return Ok(body);
            }
        }

        let (shared, joined) = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&key) {
                Some(existing) => (existing.clone(), true),
                None => {
                    let execution = self.spawn_execution(key.clone(), request);
                    in_flight.insert(key.clone(), execution.clone());
                    (execution, false)
                }
            }
        };

        if joined {
            self.inner.observer.on_dedupe_join(&key);
        }
        shared.await
    }

    /// Starts the execution on its own task so it settles even when every
    /// caller has gone away. Callers only observe the task's outcome.
    fn spawn_execution(&self, key: String, request: OutboundRequest) -> SharedResponse {
        let handle = tokio::spawn(Arc::clone(&self.inner).execute(key.clone(), request));
        let inner = Arc::clone(&self.inner);
        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    // The task died before settling; drop its entry here instead.
                    inner.in_flight.lock().remove(&key);
                    Err(Error::internal(format!("governed request aborted: {}", join_error)))
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.inner.config
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.inner.queue.status()
    }

    pub fn available_tokens(&self) -> f64 {
        self.inner.bucket.available()
    }

    pub fn cached_responses(&self) -> usize {
        self.inner.cache.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }
}

impl GovernorInner {
    /// Runs one logical request and settles its in-flight entry.
    async fn execute(self: Arc<Self>, key: String, request: OutboundRequest) -> Result<Arc<Value>> {
        let result = self.run(&key, &request).await;

        // Cache write and registry removal happen together, with no await between.
        if let Ok(body) = &result {
            if request.cacheable {
                self.cache.insert(key.clone(), Arc::clone(body));
            }
        }
        self.in_flight.lock().remove(&key);

        result
    }

    async fn run(&self, key: &str, request: &OutboundRequest) -> Result<Arc<Value>> {
        let started = Instant::now();

        let _slot = match self.queue.enter().await {
            Ok(slot) => slot,
            Err(error) => {
                self.observer.on_failure(key, 0, &error);
                return Err(error);
            }
        };
        self.observer.on_queue_status(self.queue.status());

        let mut attempt: u32 = 0;
        loop {
            let waited = self.bucket.acquire().await;
            if !waited.is_zero() {
                self.observer.on_token_wait(key, waited);
            }

            self.observer.on_request(key, attempt + 1);
            let failure = match self.attempt(request).await {
                Ok(body) => {
                    self.observer.on_success(key, attempt + 1, started.elapsed());
                    return Ok(body);
                }
                Err(failure) => failure,
            };

            let error = failure.error;
            if !error.is_retryable() || attempt >= self.config.max_retries {
                let error = if attempt > 0 {
                    Error::Exhausted {
                        attempts: attempt + 1,
                        last: Box::new(error),
                    }
                } else {
                    error
                };
                self.observer.on_failure(key, attempt + 1, &error);
                return Err(error);
            }

            let status = error.upstream_status();
            let throttled = matches!(status, Some(429) | Some(503));
            let wait = match failure.retry_after {
                Some(delay) if throttled => delay,
                _ => self.backoff.delay(attempt),
            };
            if let (true, Some(status)) = (throttled, status) {
                self.observer.on_rate_limited(key, status, failure.retry_after);
            }

            self.observer.on_retry(key, attempt + 1, wait, &error);
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, request: &OutboundRequest) -> std::result::Result<Arc<Value>, AttemptFailure> {
        let timeout = self.config.request_timeout();
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Err(_) => {
                return Err(Error::Timeout {
                    after_ms: timeout.as_millis() as u64,
                }
                .into())
            }
            Ok(result) => result?,
        };

        if !response.is_success() {
            let retry_after = response
                .retry_after
                .as_deref()
                .and_then(|h| self.backoff.retry_after(h, chrono::Utc::now()));
            return Err(AttemptFailure {
                error: Error::upstream(response.status, error_detail(&response.body)),
                retry_after,
            });
        }

        decode_body(&response.body).map_err(AttemptFailure::from)
    }
}

/// Decode a success body. Blank and `null` bodies count as empty.
pub fn decode_body(body: &[u8]) -> Result<Arc<Value>> {
    let text = std::str::from_utf8(body)
        .map_err(|e| Error::Decode(e.to_string()))?
        .trim();
    if text.is_empty() {
        return Err(Error::EmptyUpstreamResponse);
    }
    let value: Value = serde_json::from_str(text)?;
    if value.is_null() {
        return Err(Error::EmptyUpstreamResponse);
    }
    Ok(Arc::new(value))
}

fn error_detail(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "Unknown upstream error".to_string();
    }
    text.chars().take(ERROR_DETAIL_LIMIT).collect()
}
