//! Paxsenix upstream: path-style endpoints with `info.pagination` envelopes.

use async_trait::async_trait;
use dracin_common::envelope::{extract_list, unwrap_data};
use dracin_common::values::{pick, pick_text, pick_u32};
use dracin_common::{
    finalize_quality_options, normalize_drama, parse_stream_options, Category, Drama, Episode,
    Page, Pagination, QualityOption, Result,
};
use serde_json::Value;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::governor::Governor;

use super::adapter::{
    detail_via_search, embedded_stream, has_metadata, operation_for_action, sanitize_keyword,
    AdapterCore, ProviderAdapter, ProxyParams, DEFAULT_PAGE_SIZE,
};

pub struct PaxsenixAdapter {
    core: AdapterCore,
}

impl PaxsenixAdapter {
    pub fn new(config: ProviderConfig, governor: Governor) -> Self {
        Self {
            core: AdapterCore::new(config, governor),
        }
    }

    async fn listing(&self, operation: &str, default_path: &str, query: &[(&str, String)], page: u32, size: u32) -> Result<Page<Drama>> {
        let url = self.core.url(operation, default_path, &[], query)?;
        let body = self.core.fetch(url).await?;
        let items = self.core.dramas(&body);
        let info = pagination(&body, page, size, items.len());
        Ok(Page::new(items, info))
    }
}

/// Pagination from `info.pagination`, falling back to inference.
fn pagination(body: &Value, page: u32, size: u32, returned: usize) -> Pagination {
    let inferred = Pagination::inferred(page, size, returned);
    let Some(info) = body.get("info").and_then(|i| i.get("pagination")) else {
        return inferred;
    };

    let page = pick_u32(info, &["page", "currentPage"]).unwrap_or(page);
    let size = pick_u32(info, &["size", "pageSize"]).unwrap_or(size);
    let total = pick(info, &["total", "totalItems"]).and_then(Value::as_u64);
    let has_more = ["hasMore", "hasNext"]
        .iter()
        .find_map(|key| info.get(key).and_then(Value::as_bool))
        .or_else(|| {
            let total_pages = pick_u32(info, &["totalPages", "pages"])?;
            Some(page < total_pages)
        })
        .unwrap_or(inferred.has_more);

    Pagination::explicit(page, size, has_more, total)
}

#[async_trait]
impl ProviderAdapter for PaxsenixAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.core.config
    }

    async fn get_home(&self, page: u32, size: u32) -> Result<Page<Drama>> {
        self.listing(
            "home",
            "/api/home",
            &[("page", page.to_string()), ("size", size.to_string())],
            page,
            size,
        )
        .await
    }

    async fn search(&self, keyword: &str, page: u32) -> Result<Page<Drama>> {
        self.listing(
            "search",
            "/api/search",
            &[("keyword", sanitize_keyword(keyword)), ("page", page.to_string())],
            page,
            DEFAULT_PAGE_SIZE,
        )
        .await
    }

    async fn get_detail(&self, book_id: &str) -> Result<Drama> {
        let url = self.core.url("detail", "/api/detail", &[book_id, "v2"], &[])?;
        match self.core.fetch(url).await {
            Ok(body) => {
                let data = unwrap_data(&body);
                let raw = data.get("book").or_else(|| data.get("drama")).unwrap_or(data);
                if has_metadata(raw) {
                    let mut drama = normalize_drama(raw, self.core.id());
                    drama.book_id = book_id.to_string();
                    return Ok(drama);
                }
            }
            Err(e) => debug!(book_id, error = %e, "Paxsenix detail endpoint failed"),
        }

        Ok(detail_via_search(self, book_id).await)
    }

    async fn get_episodes(&self, book_id: &str) -> Result<Vec<Episode>> {
        let url = self.core.url("episodes", "/api/chapters", &[book_id], &[])?;
        let body = self.core.fetch(url).await?;
        Ok(self.core.episodes(&body))
    }

    async fn get_stream(&self, book_id: &str, chapter_id: &str) -> Result<Vec<QualityOption>> {
        match self.get_episodes(book_id).await {
            Ok(episodes) => {
                if let Some(options) = embedded_stream(&episodes, chapter_id) {
                    return Ok(options);
                }
            }
            Err(e) => debug!(book_id, error = %e, "Paxsenix chapter list unavailable for stream"),
        }

        let url = self.core.url(
            "stream",
            "/api/stream",
            &[],
            &[
                ("bookId", book_id.to_string()),
                ("chapterId", chapter_id.to_string()),
            ],
        )?;
        let body = self.core.fetch(url).await?;
        Ok(finalize_quality_options(parse_stream_options(unwrap_data(&body))))
    }

    async fn get_trending(&self, page: u32) -> Result<Page<Drama>> {
        self.listing(
            "trending",
            "/api/recommend",
            &[("page", page.to_string())],
            page,
            DEFAULT_PAGE_SIZE,
        )
        .await
    }

    async fn get_vip(&self, page: u32) -> Result<Page<Drama>> {
        self.listing("vip", "/api/vip", &[("page", page.to_string())], page, DEFAULT_PAGE_SIZE)
            .await
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        let url = self.core.url("categories", "/api/categories", &[], &[])?;
        let body = self.core.fetch(url).await?;
        Ok(extract_list(&body)
            .into_iter()
            .filter_map(|raw| {
                let id = pick_text(raw, &["id", "categoryId"])?;
                let name = pick_text(raw, &["name", "replaceName"]).unwrap_or_default();
                Some(Category { id, name })
            })
            .collect())
    }

    fn resolve_url(&self, action: &str, params: &ProxyParams) -> Result<String> {
        let book_id = params.book_id.clone().unwrap_or_default();
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(keyword) = &params.keyword {
            query.push(("keyword", sanitize_keyword(keyword)));
        }
        if let Some(page) = params.page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = params.size {
            query.push(("size", size.to_string()));
        }

        match operation_for_action(action) {
            "detail" => self.core.url("detail", "/api/detail", &[book_id.as_str(), "v2"], &query),
            "episodes" => self.core.url("episodes", "/api/chapters", &[book_id.as_str()], &query),
            "stream" => {
                query.push(("bookId", book_id.clone()));
                if let Some(chapter_id) = &params.chapter_id {
                    query.push(("chapterId", chapter_id.clone()));
                }
                self.core.url("stream", "/api/stream", &[], &query)
            }
            other => {
                let default_path = match other {
                    "foryou" => "/api/home".to_string(),
                    "recommend" => "/api/recommend".to_string(),
                    _ => format!("/api/{}", other),
                };
                if !book_id.is_empty() {
                    query.push(("bookId", book_id.clone()));
                }
                for (name, value) in &params.extra {
                    query.push((name.as_str(), value.clone()));
                }
                self.core.url(other, &default_path, &[], &query)
            }
        }
    }
}
