//! Provider id to adapter resolution.
//!
//! The [`AdapterRegistry`] maps each provider id to a constructor and
//! memoizes one adapter per id. Unknown or disabled ids resolve to the
//! configured default with a warning; only a default without an
//! implementation is an error.

use std::collections::HashMap;
use std::sync::Arc;

use dracin_common::{ids, Error, Result};
use parking_lot::Mutex;
use tracing::warn;

use crate::config::{Config, ProviderConfig};
use crate::governor::Governor;

use super::adapter::ProviderAdapter;
use super::{DramabosAdapter, GimitaAdapter, PaxsenixAdapter, SansekaiAdapter};

/// Builds an adapter from its descriptor and the shared governor.
pub type AdapterConstructor = fn(ProviderConfig, Governor) -> Arc<dyn ProviderAdapter>;

pub struct AdapterRegistry {
    providers: Vec<ProviderConfig>,
    constructors: HashMap<String, AdapterConstructor>,
    instances: Mutex<HashMap<String, Arc<dyn ProviderAdapter>>>,
    governor: Governor,
    default_id: String,
}

impl AdapterRegistry {
    /// Registry over the configured provider table with the built-in adapters registered.
    pub fn new(config: &Config, governor: Governor) -> Self {
        let mut registry = Self {
            providers: config.providers.clone(),
            constructors: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
            governor,
            default_id: config.default_provider.clone(),
        };
        registry.register(ids::PRIMARY, |c, g| Arc::new(SansekaiAdapter::new(c, g)));
        registry.register(ids::SECONDARY, |c, g| Arc::new(GimitaAdapter::new(c, g)));
        registry.register(ids::BACKUP1, |c, g| Arc::new(DramabosAdapter::new(c, g)));
        registry.register(ids::BACKUP2, |c, g| Arc::new(PaxsenixAdapter::new(c, g)));
        registry
    }

    /// Map `provider_id` to an implementation.
    pub fn register(&mut self, provider_id: &str, constructor: AdapterConstructor) {
        self.constructors.insert(provider_id.to_string(), constructor);
        self.instances.lock().remove(provider_id);
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub fn provider_config(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    /// Whether `provider_id` is enabled and has an implementation.
    pub fn is_available(&self, provider_id: &str) -> bool {
        self.provider_config(provider_id)
            .is_some_and(|p| p.enabled && self.constructors.contains_key(&p.id))
    }

    /// Ids of available providers, by priority.
    pub fn provider_ids(&self) -> Vec<String> {
        let mut providers: Vec<&ProviderConfig> = self
            .providers
            .iter()
            .filter(|p| self.is_available(&p.id))
            .collect();
        providers.sort_by_key(|p| p.priority);
        providers.into_iter().map(|p| p.id.clone()).collect()
    }

    /// Adapter for `provider_id`, created once and reused.
    pub fn create_adapter(&self, provider_id: &str) -> Result<Arc<dyn ProviderAdapter>> {
        let resolved = if self.is_available(provider_id) {
            provider_id
        } else {
            warn!(
                requested = provider_id,
                fallback = %self.default_id,
                "Unknown or unavailable provider, using default"
            );
            self.default_id.as_str()
        };

        let mut instances = self.instances.lock();
        if let Some(adapter) = instances.get(resolved) {
            return Ok(Arc::clone(adapter));
        }

        let (config, constructor) = self
            .provider_config(resolved)
            .zip(self.constructors.get(resolved))
            .ok_or_else(|| {
                Error::config(format!(
                    "default provider '{}' has no adapter implementation",
                    resolved
                ))
            })?;

        let adapter = constructor(config.clone(), self.governor.clone());
        instances.insert(resolved.to_string(), Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Drop memoized adapters so the next lookup rebuilds them.
    pub fn clear_cache(&self) {
        self.instances.lock().clear();
    }

    pub fn cached_adapters(&self) -> usize {
        self.instances.lock().len()
    }
}
