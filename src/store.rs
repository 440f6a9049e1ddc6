//! Key-value persistence for the active provider and usage statistics.
//!
//! The gateway only needs a `get`/`put` contract over JSON values. Two
//! stores ship: [`MemoryStore`] for tests and ephemeral runs, and
//! [`FileStore`] which keeps every key in one JSON document on disk.
//! Everything lives under the `"config"` key as a [`StoredConfig`].

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dracin_common::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::debounce::{DebounceOutcome, Debouncer};

/// Key holding the [`StoredConfig`] document.
pub const CONFIG_KEY: &str = "config";

/// Switch history entries kept.
pub const MAX_SWITCH_HISTORY: usize = 50;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Stores
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one pretty-printed JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, Value>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::store(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::store(format!("{}: {}", self.path.display(), e))),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load().await?.remove(key))
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::store(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| Error::store(format!("{}: {}", self.path.display(), e)))
    }
}

/// File-backed store when a path is configured, otherwise in-memory.
pub fn open_store(path: Option<&Path>) -> Arc<dyn KeyValueStore> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Using file store");
            Arc::new(FileStore::new(path))
        }
        None => Arc::new(MemoryStore::new()),
    }
}

// ----------------------------------------------------------------------------
// Stored document
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchTrigger {
    User,
    Admin,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRecord {
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    pub triggered_by: SwitchTrigger,
}

/// Per-provider usage counters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiStats {
    pub success_count: u64,
    pub error_count: u64,
    pub last_health_check: Option<DateTime<Utc>>,
    pub last_health_status: HealthStatus,
    /// Exponential moving average in milliseconds.
    pub avg_response_time: u64,
}

impl ApiStats {
    pub fn record(&mut self, success: bool, response_ms: u64, at: DateTime<Utc>) {
        if success {
            self.success_count += 1;
            self.last_health_status = HealthStatus::Healthy;
        } else {
            self.error_count += 1;
            self.last_health_status = HealthStatus::Unhealthy;
        }
        self.last_health_check = Some(at);

        self.avg_response_time = if self.avg_response_time == 0 {
            response_ms
        } else {
            (self.avg_response_time as f64 * 0.7 + response_ms as f64 * 0.3).round() as u64
        };
    }
}

/// The document stored under [`CONFIG_KEY`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredConfig {
    pub active_api_id: Option<String>,
    pub last_switch_time: Option<DateTime<Utc>>,
    pub switch_history: Vec<SwitchRecord>,
    pub api_stats: BTreeMap<String, ApiStats>,
}

impl StoredConfig {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        match store.get(CONFIG_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Self::default()),
        }
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.put(CONFIG_KEY, serde_json::to_value(self)?).await
    }

    /// Make `to` the active provider, recording the switch.
    pub fn switch_to(&mut self, to: &str, default_id: &str, reason: &str, trigger: SwitchTrigger) {
        let now = Utc::now();
        let from = self
            .active_api_id
            .clone()
            .unwrap_or_else(|| default_id.to_string());

        self.switch_history.push(SwitchRecord {
            from,
            to: to.to_string(),
            timestamp: now,
            reason: reason.to_string(),
            triggered_by: trigger,
        });
        if self.switch_history.len() > MAX_SWITCH_HISTORY {
            let excess = self.switch_history.len() - MAX_SWITCH_HISTORY;
            self.switch_history.drain(..excess);
        }

        self.active_api_id = Some(to.to_string());
        self.last_switch_time = Some(now);
    }

    pub fn stats_mut(&mut self, provider_id: &str) -> &mut ApiStats {
        self.api_stats.entry(provider_id.to_string()).or_default()
    }
}

// ----------------------------------------------------------------------------
// Usage recording
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub provider_id: String,
    pub success: bool,
    pub response_ms: u64,
    pub at: DateTime<Utc>,
}

struct RecorderInner {
    store: Arc<dyn KeyValueStore>,
    pending: Mutex<Vec<UsageSample>>,
    /// Serializes read-modify-write cycles of the stored document.
    flush_lock: tokio::sync::Mutex<()>,
    debouncer: Debouncer,
}

/// Buffers usage samples and writes them in one debounced store update.
#[derive(Clone)]
pub struct UsageRecorder {
    inner: Arc<RecorderInner>,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn KeyValueStore>, flush_delay: Duration) -> Self {
        Self {
            inner: Arc::new(RecorderInner {
                store,
                pending: Mutex::new(Vec::new()),
                flush_lock: tokio::sync::Mutex::new(()),
                debouncer: Debouncer::new(flush_delay),
            }),
        }
    }

    /// Queue one outcome; the store is written once the burst goes quiet.
    pub fn record(&self, provider_id: &str, success: bool, response_ms: u64) {
        self.inner.pending.lock().push(UsageSample {
            provider_id: provider_id.to_string(),
            success,
            response_ms,
            at: Utc::now(),
        });

        let recorder = self.clone();
        tokio::spawn(async move {
            let outcome = recorder.inner.debouncer.call(|| recorder.flush()).await;
            if let DebounceOutcome::Ran(Err(e)) = outcome {
                warn!(error = %e, "Failed to persist usage statistics");
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Write all buffered samples now. Returns how many were applied.
    pub async fn flush(&self) -> Result<usize> {
        let _guard = self.inner.flush_lock.lock().await;
        let samples = std::mem::take(&mut *self.inner.pending.lock());
        if samples.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.apply(&samples).await {
            // Put the batch back ahead of anything recorded meanwhile.
            let mut pending = self.inner.pending.lock();
            let newer = std::mem::replace(&mut *pending, samples);
            pending.extend(newer);
            return Err(e);
        }

        debug!(samples = samples.len(), "Usage statistics flushed");
        Ok(samples.len())
    }

    async fn apply(&self, samples: &[UsageSample]) -> Result<()> {
        let store = self.inner.store.as_ref();
        let mut stored = StoredConfig::load(store).await?;
        for sample in samples {
            stored
                .stats_mut(&sample.provider_id)
                .record(sample.success, sample.response_ms, sample.at);
        }
        stored.save(store).await
    }
}
