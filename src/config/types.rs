use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use dracin_common::ids;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub governor: GovernorConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Provider used when neither the request nor the store names one
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Upstream provider table (defaults to the built-in providers)
    #[serde(default = "builtin_providers")]
    pub providers: Vec<ProviderConfig>,
}

fn default_provider() -> String {
    ids::DEFAULT_PROVIDER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            governor: GovernorConfig::default(),
            store: StoreConfig::default(),
            default_provider: default_provider(),
            providers: builtin_providers(),
        }
    }
}

impl Config {
    /// Look up a provider descriptor by id.
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Enabled providers ordered by priority.
    pub fn enabled_providers(&self) -> Vec<&ProviderConfig> {
        let mut providers: Vec<_> = self.providers.iter().filter(|p| p.enabled).collect();
        providers.sort_by_key(|p| p.priority);
        providers
    }
}

// ----------------------------------------------------------------------------
// Server
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Inbound requests per minute across `/api` (unset = unlimited)
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_cors_origins() -> Vec<String> {
    [
        "https://dracin.pages.dev",
        "https://dracinku.pages.dev",
        "http://localhost:5173",
        "http://localhost:4173",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            requests_per_minute: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Governor
// ----------------------------------------------------------------------------

/// Outbound request governance settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GovernorConfig {
    /// Token refill rate
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,

    /// Bucket capacity (defaults to `requests_per_minute`)
    #[serde(default)]
    pub burst: Option<u32>,

    /// Upstream calls executing at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Pending calls allowed to wait for a slot before new ones are rejected
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Cache size above which expired entries are pruned on write
    #[serde(default = "default_cache_prune_threshold")]
    pub cache_prune_threshold: usize,

    /// Timeout of a single upstream attempt
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_rpm() -> u32 {
    15
}
fn default_max_concurrent() -> usize {
    2
}
fn default_max_queue() -> usize {
    50
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_jitter_max_ms() -> u64 {
    250
}
fn default_cache_ttl_ms() -> u64 {
    60_000
}
fn default_cache_prune_threshold() -> usize {
    100
}
fn default_request_timeout_ms() -> u64 {
    15_000
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_rpm(),
            burst: None,
            max_concurrent: default_max_concurrent(),
            max_queue: default_max_queue(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_max_ms: default_jitter_max_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_prune_threshold: default_cache_prune_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl GovernorConfig {
    pub fn capacity(&self) -> u32 {
        self.burst.unwrap_or(self.requests_per_minute).max(1)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ----------------------------------------------------------------------------
// Store
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// JSON state file (unset = in-memory only)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Upper bound on a store read during provider selection
    #[serde(default = "default_store_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Quiet period before buffered usage statistics are written
    #[serde(default = "default_usage_flush_ms")]
    pub usage_flush_ms: u64,
}

fn default_store_read_timeout_ms() -> u64 {
    2_000
}
fn default_usage_flush_ms() -> u64 {
    2_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            read_timeout_ms: default_store_read_timeout_ms(),
            usage_flush_ms: default_usage_flush_ms(),
        }
    }
}

impl StoreConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn usage_flush(&self) -> Duration {
        Duration::from_millis(self.usage_flush_ms)
    }
}

// ----------------------------------------------------------------------------
// Providers
// ----------------------------------------------------------------------------

/// How a provider encodes the requested operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFormat {
    /// Operation is a path segment (`/search?query=...`)
    #[default]
    Path,
    /// Operation is an `action` query parameter (`?action=search&query=...`)
    Action,
}

impl std::fmt::Display for QueryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// Requests-per-period hint published for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitHint {
    pub requests: u32,
    #[serde(default = "default_period_secs")]
    pub period_secs: u64,
}

fn default_period_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthCheckConfig {
    /// Probe path (or query) appended to the base URL
    #[serde(default)]
    pub endpoint: String,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,

    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_expected_status() -> u16 {
    200
}
fn default_health_timeout_ms() -> u64 {
    5_000
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            expected_status: default_expected_status(),
            timeout_ms: default_health_timeout_ms(),
        }
    }
}

/// Static descriptor of one upstream provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub id: String,

    pub name: String,

    pub base_url: String,

    /// Lower is preferred
    #[serde(default)]
    pub priority: u32,

    #[serde(default)]
    pub query_format: QueryFormat,

    /// Operation name to path (or action) overrides
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitHint>,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("User-Agent".to_string(), "Dracin-Stream/2.0".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
    ])
}

impl ProviderConfig {
    /// Path or action configured for `operation`, else `default`.
    pub fn endpoint<'a>(&'a self, operation: &str, default: &'a str) -> &'a str {
        self.endpoints
            .get(operation)
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Probe URL; an absolute endpoint is used as-is.
    pub fn health_url(&self) -> String {
        let probe = &self.health_check.endpoint;
        if probe.starts_with("http://") || probe.starts_with("https://") {
            probe.clone()
        } else if probe.starts_with('?') || probe.starts_with('/') || probe.is_empty() {
            format!("{}{}", self.base(), probe)
        } else {
            format!("{}/{}", self.base(), probe)
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check.timeout_ms)
    }
}

#[allow(clippy::too_many_arguments)]
fn provider(
    id: &str,
    name: &str,
    base_url: &str,
    priority: u32,
    query_format: QueryFormat,
    endpoints: &[(&str, &str)],
    requests: u32,
    health: &str,
) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        name: name.to_string(),
        base_url: base_url.to_string(),
        priority,
        query_format,
        endpoints: endpoints
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        headers: default_headers(),
        rate_limit: Some(RateLimitHint {
            requests,
            period_secs: 60,
        }),
        health_check: HealthCheckConfig {
            endpoint: health.to_string(),
            ..HealthCheckConfig::default()
        },
        enabled: true,
    }
}

/// The four upstream providers the gateway ships with.
pub fn builtin_providers() -> Vec<ProviderConfig> {
    vec![
        provider(
            ids::PRIMARY,
            "Primary API (Sansekai)",
            "https://api.sansekai.my.id/api/dramabox",
            1,
            QueryFormat::Path,
            &[
                ("home", "/trending"),
                ("search", "/search"),
                ("detail", "/detail"),
                ("episodes", "/allepisode"),
                ("stream", "/allepisode"),
                ("trending", "/trending"),
                ("vip", "/vip"),
            ],
            100,
            "/trending",
        ),
        provider(
            ids::SECONDARY,
            "Secondary API (Gimita)",
            "https://api.gimita.id/api/search/dramabox",
            2,
            QueryFormat::Action,
            &[
                ("home", "home"),
                ("search", "search"),
                ("episodes", "chapters"),
                ("stream", "stream"),
                ("trending", "home"),
                ("vip", "vip"),
            ],
            80,
            "?action=home&page=1&size=1",
        ),
        provider(
            ids::BACKUP1,
            "Backup API 1 (Dramabos)",
            "https://dramabos.asia/api/dramabox",
            3,
            QueryFormat::Path,
            &[
                ("home", "/foryou"),
                ("search", "/search"),
                ("detail", "/drama"),
                ("episodes", "/chapters"),
                ("stream", "/watch/player"),
                ("trending", "/rank"),
                ("vip", "/new"),
                ("categories", "/classify"),
            ],
            60,
            "/foryou/1",
        ),
        provider(
            ids::BACKUP2,
            "Backup API 2 (Paxsenix)",
            "https://kdjekek-usieke-owjejxkek-iwjwjxkod.vercel.app",
            4,
            QueryFormat::Path,
            &[
                ("home", "/api/home"),
                ("search", "/api/search"),
                ("detail", "/api/detail"),
                ("episodes", "/api/chapters"),
                ("stream", "/api/stream"),
                ("trending", "/api/recommend"),
                ("vip", "/api/vip"),
                ("categories", "/api/categories"),
            ],
            100,
            "/api/home",
        ),
    ]
}
