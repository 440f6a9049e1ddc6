//! Normalized catalog endpoints under `/api/catalog`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use dracin_common::{EpisodeSummary, Error, Page, QualityOption, Result};
use serde::{Deserialize, Serialize};

use crate::providers::{ProviderAdapter, DEFAULT_PAGE_SIZE};

use super::error::ProxyError;
use super::{AppContext, ACTIVE_PROVIDER_HEADER};

pub fn catalog_routes() -> Router<AppContext> {
    Router::new()
        .route("/catalog/home", get(home))
        .route("/catalog/trending", get(trending))
        .route("/catalog/vip", get(vip))
        .route("/catalog/search", get(search))
        .route("/catalog/categories", get(categories))
        .route("/catalog/dramas/:book_id", get(detail))
        .route("/catalog/dramas/:book_id/episodes", get(episodes))
        .route(
            "/catalog/dramas/:book_id/episodes/:chapter_id/stream",
            get(stream),
        )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    size: Option<u32>,
    provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    query: Option<String>,
    keyword: Option<String>,
    page: Option<u32>,
    provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemQuery {
    provider: Option<String>,
    mode: Option<String>,
}

/// Body of every catalog response.
#[derive(Debug, Serialize)]
struct Catalog<T> {
    provider: String,
    data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamBody {
    book_id: String,
    chapter_id: String,
    video_url: Option<String>,
    quality_options: Vec<QualityOption>,
}

/// Selects the adapter, runs `call` against it and records the outcome.
async fn serve<T, F, Fut>(
    ctx: &AppContext,
    provider: Option<&str>,
    call: F,
) -> std::result::Result<Response, ProxyError>
where
    T: Serialize,
    F: FnOnce(Arc<dyn ProviderAdapter>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let selection = ctx.selector.select(provider).await;
    let adapter = ctx.registry.create_adapter(&selection.provider_id)?;
    let provider_id = adapter.provider_id().to_string();

    let started = Instant::now();
    let result = call(adapter).await;
    ctx.usage
        .record(&provider_id, result.is_ok(), started.elapsed().as_millis() as u64);
    let data = result.map_err(|e| ProxyError::new(e, &provider_id))?;

    let mut response = Json(Catalog {
        provider: provider_id.clone(),
        data,
    })
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&provider_id) {
        response.headers_mut().insert(ACTIVE_PROVIDER_HEADER, value);
    }
    Ok(response)
}

async fn home(
    State(ctx): State<AppContext>,
    Query(q): Query<ListQuery>,
) -> std::result::Result<Response, ProxyError> {
    let page = q.page.unwrap_or(1).max(1);
    let size = q.size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        adapter.get_home(page, size).await
    })
    .await
}

async fn trending(
    State(ctx): State<AppContext>,
    Query(q): Query<ListQuery>,
) -> std::result::Result<Response, ProxyError> {
    let page = q.page.unwrap_or(1).max(1);
    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        adapter.get_trending(page).await
    })
    .await
}

async fn vip(
    State(ctx): State<AppContext>,
    Query(q): Query<ListQuery>,
) -> std::result::Result<Response, ProxyError> {
    let page = q.page.unwrap_or(1).max(1);
    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        adapter.get_vip(page).await
    })
    .await
}

async fn search(
    State(ctx): State<AppContext>,
    Query(q): Query<SearchQuery>,
) -> std::result::Result<Response, ProxyError> {
    let page = q.page.unwrap_or(1).max(1);
    let keyword = q
        .q
        .or(q.query)
        .or(q.keyword)
        .map(|k| k.trim().to_string())
        .unwrap_or_default();

    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        if keyword.is_empty() {
            return Ok(Page::empty(page, DEFAULT_PAGE_SIZE));
        }
        adapter.search(&keyword, page).await
    })
    .await
}

async fn categories(
    State(ctx): State<AppContext>,
    Query(q): Query<ItemQuery>,
) -> std::result::Result<Response, ProxyError> {
    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        adapter.get_categories().await
    })
    .await
}

async fn detail(
    State(ctx): State<AppContext>,
    Path(book_id): Path<String>,
    Query(q): Query<ItemQuery>,
) -> std::result::Result<Response, ProxyError> {
    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        adapter.get_detail(&book_id).await
    })
    .await
}

async fn episodes(
    State(ctx): State<AppContext>,
    Path(book_id): Path<String>,
    Query(q): Query<ItemQuery>,
) -> std::result::Result<Response, ProxyError> {
    if q.mode.as_deref() == Some("list") {
        return serve(&ctx, q.provider.as_deref(), |adapter| async move {
            let episodes = adapter.get_episodes(&book_id).await?;
            Ok::<_, Error>(episodes.iter().map(EpisodeSummary::from).collect::<Vec<_>>())
        })
        .await;
    }

    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        adapter.get_episodes(&book_id).await
    })
    .await
}

async fn stream(
    State(ctx): State<AppContext>,
    Path((book_id, chapter_id)): Path<(String, String)>,
    Query(q): Query<ItemQuery>,
) -> std::result::Result<Response, ProxyError> {
    serve(&ctx, q.provider.as_deref(), |adapter| async move {
        let options = adapter.get_stream(&book_id, &chapter_id).await?;
        Ok::<_, Error>(StreamBody {
            video_url: options.first().map(|o| o.video_url.clone()),
            quality_options: options,
            book_id,
            chapter_id,
        })
    })
    .await
}
