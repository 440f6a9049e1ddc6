//! `GET /api/proxy/:action`: raw upstream payloads through the governor.

use std::time::Instant;

use axum::{
    extract::{Path, RawQuery, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dracin_common::values::{is_truthy, pick};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::governor::OutboundRequest;
use crate::providers::{ProviderAdapter, ProxyParams};

use super::error::ProxyError;
use super::{AppContext, ACTIVE_PROVIDER_HEADER};

pub fn proxy_routes() -> Router<AppContext> {
    Router::new().route("/proxy/:action", get(proxy))
}

/// Query parameters of a proxy call, split into gateway controls and
/// upstream parameters.
#[derive(Debug, Default, PartialEq)]
pub struct ProxyQuery {
    pub provider: Option<String>,
    pub mode: Option<String>,
    pub params: ProxyParams,
}

impl ProxyQuery {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let pairs = url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes());

        for (name, value) in pairs {
            let value = value.into_owned();
            match name.as_ref() {
                "provider" => query.provider = Some(value),
                "mode" => query.mode = Some(value),
                "bookId" | "book_id" => query.params.book_id = Some(value),
                "chapterId" | "chapter_id" => query.params.chapter_id = Some(value),
                "query" | "keyword" => {
                    if query.params.keyword.is_none() {
                        query.params.keyword = Some(value);
                    }
                }
                "page" => query.params.page = value.parse().ok(),
                "size" => query.params.size = value.parse().ok(),
                other => query.params.extra.push((other.to_string(), value)),
            }
        }
        query
    }

    fn wants_list(&self) -> bool {
        self.mode.as_deref() == Some("list")
    }
}

async fn proxy(
    State(ctx): State<AppContext>,
    Path(action): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ProxyError> {
    let query = ProxyQuery::parse(raw.as_deref());
    let selection = ctx.selector.select(query.provider.as_deref()).await;
    let adapter = ctx.registry.create_adapter(&selection.provider_id)?;
    let provider_id = adapter.provider_id().to_string();

    let url = adapter
        .resolve_url(&action, &query.params)
        .map_err(|e| ProxyError::new(e, &provider_id))?;
    debug!(provider = %provider_id, action = %action, url = %url, "Proxying");

    let started = Instant::now();
    let result = ctx.governor.fetch_json(outbound(adapter.as_ref(), url)).await;
    ctx.usage
        .record(&provider_id, result.is_ok(), started.elapsed().as_millis() as u64);
    let body = result.map_err(|e| ProxyError::new(e, &provider_id))?;

    if has_error_indicator(&body) {
        warn!(
            provider = %provider_id,
            detail = ?body.get("error").or_else(|| body.get("message")),
            "Upstream reported an error in a success response"
        );
    }

    let payload = if query.wants_list() && is_episode_list_action(&action) {
        lightweight_episode_list(&body).unwrap_or_else(|| body.as_ref().clone())
    } else {
        body.as_ref().clone()
    };

    let mut response = Json(payload).into_response();
    if let Ok(value) = HeaderValue::from_str(&provider_id) {
        response.headers_mut().insert(ACTIVE_PROVIDER_HEADER, value);
    }
    Ok(response)
}

fn outbound(adapter: &dyn ProviderAdapter, url: String) -> OutboundRequest {
    OutboundRequest::get(url).headers(adapter.config().headers.iter())
}

fn is_episode_list_action(action: &str) -> bool {
    matches!(action, "allepisode" | "chapters" | "episodes" | "download")
}

/// `error`, `code == "error"` or `success == false` in a 2xx body.
pub fn has_error_indicator(body: &Value) -> bool {
    body.get("error").is_some_and(is_truthy)
        || body.get("code").and_then(Value::as_str) == Some("error")
        || body.get("success").and_then(Value::as_bool) == Some(false)
}

/// Episode list stripped to `{chapterId, chapterIndex, chapterName, cover}`.
///
/// A bare array stays an array; otherwise the list replaces `data` in the
/// original envelope. `None` when no non-empty list is found.
pub fn lightweight_episode_list(body: &Value) -> Option<Value> {
    let data = body.get("data");
    let list = [
        body.as_array(),
        data.and_then(Value::as_array),
        data.and_then(|d| d.get("chapters")).and_then(Value::as_array),
        body.get("chapters").and_then(Value::as_array),
        body.get("videos").and_then(Value::as_array),
        data.and_then(|d| d.get("videos")).and_then(Value::as_array),
    ]
    .into_iter()
    .flatten()
    .next()
    .filter(|list| !list.is_empty())?;

    let light: Vec<Value> = list.iter().map(lightweight_episode).collect();

    match body {
        Value::Array(_) => Some(Value::Array(light)),
        Value::Object(envelope) => {
            let mut envelope = envelope.clone();
            envelope.insert("data".to_string(), Value::Array(light));
            Some(Value::Object(envelope))
        }
        _ => None,
    }
}

fn lightweight_episode(item: &Value) -> Value {
    let fields: [(&str, &[&str]); 4] = [
        ("chapterId", &["chapterId", "chapterid", "vid", "id"]),
        ("chapterIndex", &["chapterIndex", "episode", "index"]),
        ("chapterName", &["chapterName", "episode", "name", "title"]),
        ("cover", &["cover", "coverUrl"]),
    ];

    let mut light = Map::new();
    for (name, keys) in fields {
        if let Some(value) = pick(item, keys) {
            light.insert(name.to_string(), value.clone());
        }
    }
    Value::Object(light)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_query_splits_controls() {
        let query = ProxyQuery::parse(Some(
            "provider=api_backup1&bookId=42&chapterId=7&query=ceo%20love&page=2&size=10&lang=id&mode=list",
        ));
        assert_eq!(query.provider.as_deref(), Some("api_backup1"));
        assert_eq!(query.mode.as_deref(), Some("list"));
        assert_eq!(query.params.book_id.as_deref(), Some("42"));
        assert_eq!(query.params.chapter_id.as_deref(), Some("7"));
        assert_eq!(query.params.keyword.as_deref(), Some("ceo love"));
        assert_eq!(query.params.page, Some(2));
        assert_eq!(query.params.size, Some(10));
        assert_eq!(query.params.extra, vec![("lang".to_string(), "id".to_string())]);
    }

    #[test]
    fn test_parse_query_prefers_first_keyword() {
        let query = ProxyQuery::parse(Some("keyword=a&query=b"));
        assert_eq!(query.params.keyword.as_deref(), Some("a"));
        assert_eq!(ProxyQuery::parse(None), ProxyQuery::default());
    }

    #[test]
    fn test_error_indicators() {
        assert!(has_error_indicator(&json!({"error": "quota"})));
        assert!(has_error_indicator(&json!({"code": "error"})));
        assert!(has_error_indicator(&json!({"success": false, "data": []})));
        assert!(!has_error_indicator(&json!({"success": true, "error": null})));
        assert!(!has_error_indicator(&json!([1, 2])));
    }

    #[test]
    fn test_lightweight_list_keeps_envelope() {
        let body = json!({
            "success": true,
            "data": {
                "chapters": [{
                    "chapterId": "c1",
                    "chapterIndex": 1,
                    "chapterName": "EP 1",
                    "cdnList": [{"videoPathList": [{"videoPath": "https://v/1.mp4"}]}]
                }]
            }
        });
        let light = lightweight_episode_list(&body).unwrap();
        assert_eq!(light["success"], json!(true));
        assert_eq!(
            light["data"],
            json!([{"chapterId": "c1", "chapterIndex": 1, "chapterName": "EP 1"}])
        );
    }

    #[test]
    fn test_lightweight_list_bare_array() {
        let body = json!([{"vid": "9", "episode": 3, "coverUrl": "https://c/3.jpg", "videoPath": "x"}]);
        let light = lightweight_episode_list(&body).unwrap();
        assert_eq!(
            light,
            json!([{"chapterId": "9", "chapterIndex": 3, "chapterName": 3, "cover": "https://c/3.jpg"}])
        );
    }

    #[test]
    fn test_lightweight_list_absent() {
        assert!(lightweight_episode_list(&json!({"data": []})).is_none());
        assert!(lightweight_episode_list(&json!({"data": {"book": {}}})).is_none());
    }
}
