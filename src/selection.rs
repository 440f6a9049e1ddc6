//! Per-request provider selection.
//!
//! Precedence is an explicit override, then the active provider persisted in
//! the store, then the configured default. The store read is bounded by a
//! timeout and any store failure degrades silently to the default.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::providers::AdapterRegistry;
use crate::store::{KeyValueStore, StoredConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionSource {
    Override,
    Stored,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub provider_id: String,
    pub source: SelectionSource,
}

#[derive(Clone)]
pub struct ProviderSelector {
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn KeyValueStore>,
    read_timeout: Duration,
}

impl ProviderSelector {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        store: Arc<dyn KeyValueStore>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            read_timeout,
        }
    }

    /// Resolve the provider serving one request.
    pub async fn select(&self, override_id: Option<&str>) -> Selection {
        if let Some(id) = override_id.map(str::trim).filter(|id| !id.is_empty()) {
            if self.registry.is_available(id) {
                return Selection {
                    provider_id: id.to_string(),
                    source: SelectionSource::Override,
                };
            }
            warn!(provider = id, "Ignoring unknown provider override");
        }

        if let Some(id) = self.stored_preference().await {
            if self.registry.is_available(&id) {
                return Selection {
                    provider_id: id,
                    source: SelectionSource::Stored,
                };
            }
            warn!(provider = %id, "Stored active provider is unavailable, using default");
        }

        Selection {
            provider_id: self.registry.default_id().to_string(),
            source: SelectionSource::Default,
        }
    }

    /// The persisted active provider, if the store answers in time.
    pub async fn stored_preference(&self) -> Option<String> {
        let read = StoredConfig::load(self.store.as_ref());
        match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(stored)) => stored.active_api_id.filter(|id| !id.is_empty()),
            Ok(Err(e)) => {
                warn!(error = %e, "Store read failed, falling back to default provider");
                None
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.read_timeout.as_millis() as u64,
                    "Store read timed out, falling back to default provider"
                );
                None
            }
        }
    }
}
