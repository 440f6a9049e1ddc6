//! Gateway health and the provider table.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::config::{QueryFormat, RateLimitHint};
use crate::store::{ApiStats, StoredConfig};

use super::AppContext;

pub fn health_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/providers", get(providers))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderEntry {
    id: String,
    name: String,
    base_url: String,
    priority: u32,
    query_format: QueryFormat,
    rate_limit: Option<RateLimitHint>,
    enabled: bool,
    available: bool,
    active: bool,
    stats: Option<ApiStats>,
}

/// Stored document plus a `kvStatus` label, bounded by the store timeout.
async fn read_store(ctx: &AppContext) -> (Option<StoredConfig>, &'static str, Option<String>) {
    let read = StoredConfig::load(ctx.store.as_ref());
    match tokio::time::timeout(ctx.config.store.read_timeout(), read).await {
        Ok(Ok(stored)) => (Some(stored), "Connected", None),
        Ok(Err(e)) => (None, "Error", Some(e.to_string())),
        Err(_) => (None, "Error", Some("store read timed out".to_string())),
    }
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    let (stored, kv_status, kv_error) = read_store(&ctx).await;

    let active_id = stored
        .and_then(|s| s.active_api_id)
        .filter(|id| ctx.registry.is_available(id))
        .unwrap_or_else(|| ctx.registry.default_id().to_string());
    let active = ctx.registry.provider_config(&active_id);

    Json(json!({
        "success": true,
        "timestamp": Utc::now().to_rfc3339(),
        "kvStatus": kv_status,
        "kvError": kv_error,
        "activeApi": {
            "id": active_id,
            "name": active.map(|p| p.name.as_str()).unwrap_or("Unknown"),
            "baseUrl": active.map(|p| p.base_url.as_str()).unwrap_or("Unknown"),
            "queryFormat": active.map(|p| p.query_format),
        },
        "availableApis": ctx.registry.provider_ids(),
        "governor": {
            "queue": ctx.governor.queue_status(),
            "availableTokens": ctx.governor.available_tokens(),
            "cachedResponses": ctx.governor.cached_responses(),
            "inFlight": ctx.governor.in_flight(),
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn providers(State(ctx): State<AppContext>) -> impl IntoResponse {
    let (stored, _, _) = read_store(&ctx).await;
    let stored = stored.unwrap_or_default();
    let active_id = stored
        .active_api_id
        .clone()
        .filter(|id| ctx.registry.is_available(id))
        .unwrap_or_else(|| ctx.registry.default_id().to_string());

    let mut entries: Vec<ProviderEntry> = ctx
        .config
        .providers
        .iter()
        .map(|p| ProviderEntry {
            id: p.id.clone(),
            name: p.name.clone(),
            base_url: p.base_url.clone(),
            priority: p.priority,
            query_format: p.query_format,
            rate_limit: p.rate_limit,
            enabled: p.enabled,
            available: ctx.registry.is_available(&p.id),
            active: p.id == active_id,
            stats: stored.api_stats.get(&p.id).cloned(),
        })
        .collect();
    entries.sort_by_key(|e| e.priority);

    Json(json!({
        "activeApiId": active_id,
        "providers": entries,
        "switchHistory": stored.switch_history,
    }))
}
