//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which points every built-in provider at one
//! wiremock server, keeps provider state in a [`MemoryStore`], and builds a
//! full [`AppContext`]. The [`TestHarness::with_server`] constructor starts
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use dracin::config::{Config, GovernorConfig};
use dracin::governor::Governor;
use dracin::server::{create_router, AppContext};
use dracin::store::{KeyValueStore, MemoryStore};

/// Governor settings that never make a test wait.
pub fn fast_governor() -> GovernorConfig {
    GovernorConfig {
        requests_per_minute: 60_000,
        burst: Some(1_000),
        max_concurrent: 8,
        max_queue: 100,
        max_retries: 0,
        jitter_max_ms: 0,
        cache_ttl_ms: 0,
        request_timeout_ms: 2_000,
        ..GovernorConfig::default()
    }
}

/// Default configuration with every provider served by `upstream`.
pub fn test_config(upstream: &str) -> Config {
    let mut config = Config::default();
    for provider in &mut config.providers {
        provider.base_url = upstream.to_string();
    }
    config.governor = fast_governor();
    config.store.usage_flush_ms = 10;
    config
}

/// Test harness wrapping a fully-constructed [`AppContext`] whose upstreams
/// all live on [`TestHarness::upstream`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub store: Arc<MemoryStore>,
    pub upstream: MockServer,
}

impl TestHarness {
    /// Create a new harness with the test configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a harness after letting `customize` adjust the configuration.
    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let upstream = MockServer::start().await;
        let mut config = test_config(&upstream.uri());
        customize(&mut config);

        let governor =
            Governor::new(config.governor.clone()).expect("failed to build governor");
        let store = Arc::new(MemoryStore::new());
        let kv: Arc<dyn KeyValueStore> = store.clone();
        let ctx = AppContext::with_parts(config, governor, kv);

        Self {
            ctx,
            store,
            upstream,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Issue a GET through a fresh router and decode the JSON body.
    ///
    /// A non-JSON body decodes to `Value::Null`.
    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Value) {
        send(self.router(), uri).await
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new().await;
        let app = harness.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }
}

/// One GET against `app`.
pub async fn send(app: Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request");
    let response = app.oneshot(request).await.expect("router failed");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}
