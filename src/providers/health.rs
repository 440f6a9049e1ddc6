//! Raw health probes against each provider's health-check descriptor.
//!
//! Probes bypass the governor: they measure the upstream as it is, with the
//! descriptor's own timeout and expected status.

use std::time::Instant;

use chrono::{DateTime, Utc};
use dracin_common::Result;
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::store::{KeyValueStore, StoredConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub provider_id: String,
    pub healthy: bool,
    /// `HTTP <code>`, `Timeout` or `Connection failed`
    pub status: String,
    pub response_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// GET the provider's probe URL and compare the status with the expected one.
pub async fn probe(client: &reqwest::Client, provider: &ProviderConfig) -> ProbeResult {
    let url = provider.health_url();
    let mut request = client.get(&url).timeout(provider.health_timeout());
    for (name, value) in &provider.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let started = Instant::now();
    let outcome = request.send().await;
    let response_ms = started.elapsed().as_millis() as u64;

    let (healthy, status) = match outcome {
        Ok(response) => {
            let code = response.status().as_u16();
            (
                code == provider.health_check.expected_status,
                format!("HTTP {}", code),
            )
        }
        Err(e) if e.is_timeout() => (false, "Timeout".to_string()),
        Err(e) => {
            debug!(provider = %provider.id, url = %url, error = %e, "Health probe failed");
            (false, "Connection failed".to_string())
        }
    };

    ProbeResult {
        provider_id: provider.id.clone(),
        healthy,
        status,
        response_ms,
        timestamp: Utc::now(),
    }
}

/// Probe every provider concurrently, preserving input order.
pub async fn probe_all<'a, I>(client: &reqwest::Client, providers: I) -> Vec<ProbeResult>
where
    I: IntoIterator<Item = &'a ProviderConfig>,
{
    join_all(providers.into_iter().map(|p| probe(client, p))).await
}

/// Fold probe outcomes into the stored usage statistics in one write.
pub async fn record_probes(store: &dyn KeyValueStore, results: &[ProbeResult]) -> Result<()> {
    if results.is_empty() {
        return Ok(());
    }
    let mut stored = StoredConfig::load(store).await?;
    for result in results {
        stored
            .stats_mut(&result.provider_id)
            .record(result.healthy, result.response_ms, result.timestamp);
    }
    stored.save(store).await
}
