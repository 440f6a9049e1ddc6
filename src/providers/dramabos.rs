//! Dramabos upstream: identifiers and page numbers travel in the path.

use async_trait::async_trait;
use dracin_common::envelope::{extract_list, unwrap_data};
use dracin_common::values::pick_text;
use dracin_common::{
    finalize_quality_options, normalize_drama, parse_stream_options, Category, Drama, Episode,
    Page, Pagination, QualityOption, Result,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::governor::Governor;

use super::adapter::{
    detail_via_search, embedded_stream, has_metadata, operation_for_action, sanitize_keyword,
    AdapterCore, ProviderAdapter, ProxyParams, DEFAULT_PAGE_SIZE,
};

pub struct DramabosAdapter {
    core: AdapterCore,
}

impl DramabosAdapter {
    pub fn new(config: ProviderConfig, governor: Governor) -> Self {
        Self {
            core: AdapterCore::new(config, governor),
        }
    }

    /// A listing addressed as `{endpoint}/{page}`.
    async fn paged_list(&self, operation: &str, default_path: &str, page: u32, size: u32) -> Result<Page<Drama>> {
        let page_segment = page.to_string();
        let url = self.core.url(operation, default_path, &[page_segment.as_str()], &[])?;
        let body = self.core.fetch(url).await?;
        let items = self.core.dramas(&body);
        let info = pagination(&body, page, size, items.len());
        Ok(Page::new(items, info))
    }
}

/// Explicit `data.isMore` / `data.total` when present, else inferred.
fn pagination(body: &Value, page: u32, size: u32, returned: usize) -> Pagination {
    let data = unwrap_data(body);
    let inferred = Pagination::inferred(page, size, returned);
    Pagination {
        has_more: data
            .get("isMore")
            .and_then(Value::as_bool)
            .unwrap_or(inferred.has_more),
        total: data.get("total").and_then(Value::as_u64),
        ..inferred
    }
}

#[async_trait]
impl ProviderAdapter for DramabosAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.core.config
    }

    async fn get_home(&self, page: u32, size: u32) -> Result<Page<Drama>> {
        self.paged_list("home", "/foryou", page, size).await
    }

    /// Search is frequently unavailable upstream; failures yield an empty page.
    async fn search(&self, keyword: &str, page: u32) -> Result<Page<Drama>> {
        let keyword = sanitize_keyword(keyword);
        let page_segment = page.to_string();
        let url = self
            .core
            .url("search", "/search", &[keyword.as_str(), page_segment.as_str()], &[])?;

        match self.core.fetch(url).await {
            Ok(body) => Ok(Page::inferred(self.core.dramas(&body), page, DEFAULT_PAGE_SIZE)),
            Err(e) => {
                warn!(error = %e, "Dramabos search unavailable, returning empty results");
                Ok(Page::empty(page, DEFAULT_PAGE_SIZE))
            }
        }
    }

    async fn get_detail(&self, book_id: &str) -> Result<Drama> {
        let url = self.core.url("detail", "/drama", &[book_id], &[])?;
        match self.core.fetch(url).await {
            Ok(body) => {
                let raw = unwrap_data(&body);
                if has_metadata(raw) {
                    let mut drama = normalize_drama(raw, self.core.id());
                    drama.book_id = book_id.to_string();
                    return Ok(drama);
                }
            }
            Err(e) => debug!(book_id, error = %e, "Dramabos detail endpoint failed"),
        }

        // The for-you feed carries full metadata for the titles it lists.
        if let Ok(home) = self.get_home(1, 50).await {
            if let Some(found) = home.items.into_iter().find(|d| d.book_id == book_id) {
                return Ok(found);
            }
        }

        Ok(detail_via_search(self, book_id).await)
    }

    async fn get_episodes(&self, book_id: &str) -> Result<Vec<Episode>> {
        let url = self.core.url("episodes", "/chapters", &[book_id], &[])?;
        match self.core.fetch(url).await {
            Ok(body) => Ok(self.core.episodes(&body)),
            Err(e) => {
                warn!(book_id, error = %e, "Dramabos chapters endpoint failed");
                Ok(Vec::new())
            }
        }
    }

    async fn get_stream(&self, book_id: &str, chapter_id: &str) -> Result<Vec<QualityOption>> {
        let episodes = self.get_episodes(book_id).await?;
        if let Some(options) = embedded_stream(&episodes, chapter_id) {
            return Ok(options);
        }

        let url = self.core.url(
            "stream",
            "/watch/player",
            &[],
            &[
                ("bookId", book_id.to_string()),
                ("chapterId", chapter_id.to_string()),
            ],
        )?;
        match self.core.fetch(url).await {
            Ok(body) => Ok(finalize_quality_options(parse_stream_options(unwrap_data(&body)))),
            Err(e) => {
                warn!(book_id, chapter_id, error = %e, "Dramabos stream endpoint failed");
                Ok(Vec::new())
            }
        }
    }

    async fn get_trending(&self, page: u32) -> Result<Page<Drama>> {
        self.paged_list("trending", "/rank", page, DEFAULT_PAGE_SIZE).await
    }

    async fn get_vip(&self, page: u32) -> Result<Page<Drama>> {
        self.paged_list("vip", "/new", page, DEFAULT_PAGE_SIZE).await
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        let url = self.core.url("categories", "/classify", &[], &[])?;
        let body = self.core.fetch(url).await?;
        Ok(extract_list(&body)
            .into_iter()
            .filter_map(|raw| {
                let id = pick_text(raw, &["id", "classifyId", "bookId"])?;
                let name = pick_text(raw, &["name", "classifyName", "bookName"]).unwrap_or_default();
                Some(Category { id, name })
            })
            .collect())
    }

    fn resolve_url(&self, action: &str, params: &ProxyParams) -> Result<String> {
        let page = params.page_or_default().to_string();
        let book_id = params.book_id.clone().unwrap_or_default();

        match operation_for_action(action) {
            "home" | "foryou" => self.core.url("home", "/foryou", &[page.as_str()], &[]),
            "trending" => self.core.url("trending", "/rank", &[page.as_str()], &[]),
            "vip" => self.core.url("vip", "/new", &[page.as_str()], &[]),
            "search" => {
                let keyword = params.keyword.as_deref().map(sanitize_keyword).unwrap_or_default();
                self.core.url("search", "/search", &[keyword.as_str(), page.as_str()], &[])
            }
            "detail" => self.core.url("detail", "/drama", &[book_id.as_str()], &[]),
            "episodes" => self.core.url("episodes", "/chapters", &[book_id.as_str()], &[]),
            "stream" => self.core.url(
                "stream",
                "/watch/player",
                &[],
                &[
                    ("bookId", book_id.clone()),
                    ("chapterId", params.chapter_id.clone().unwrap_or_default()),
                ],
            ),
            "categories" => self.core.url("categories", "/classify", &[], &[]),
            other => {
                let query: Vec<(&str, String)> = params
                    .extra
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.clone()))
                    .collect();
                self.core.url(other, &format!("/{}", other), &[], &query)
            }
        }
    }
}
