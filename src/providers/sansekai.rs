//! Sansekai upstream: path-style endpoints, `/trending` doubles as home.

use async_trait::async_trait;
use dracin_common::envelope::unwrap_data;
use dracin_common::{normalize_drama, Drama, Episode, Page, Pagination, QualityOption, Result};

use crate::config::ProviderConfig;
use crate::governor::Governor;

use super::adapter::{
    detail_via_search, embedded_stream, has_metadata, operation_for_action, sanitize_keyword,
    AdapterCore, ProviderAdapter, ProxyParams, DEFAULT_PAGE_SIZE,
};

pub struct SansekaiAdapter {
    core: AdapterCore,
}

impl SansekaiAdapter {
    pub fn new(config: ProviderConfig, governor: Governor) -> Self {
        Self {
            core: AdapterCore::new(config, governor),
        }
    }

    /// The trending list is returned whole; pages are cut locally.
    async fn trending_page(&self, operation: &str, page: u32, size: u32) -> Result<Page<Drama>> {
        let url = self.core.url(operation, "/trending", &[], &[])?;
        let body = self.core.fetch(url).await?;
        let all = self.core.dramas(&body);

        let page = page.max(1);
        let size = size.max(1);
        let total = all.len();
        let start = (page as usize - 1).saturating_mul(size as usize);
        let end = start.saturating_add(size as usize);
        let items: Vec<Drama> = all.into_iter().skip(start).take(size as usize).collect();

        Ok(Page::new(
            items,
            Pagination::explicit(page, size, total > end, Some(total as u64)),
        ))
    }
}

#[async_trait]
impl ProviderAdapter for SansekaiAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.core.config
    }

    async fn get_home(&self, page: u32, size: u32) -> Result<Page<Drama>> {
        self.trending_page("home", page, size).await
    }

    async fn search(&self, keyword: &str, page: u32) -> Result<Page<Drama>> {
        let url = self.core.url(
            "search",
            "/search",
            &[],
            &[("query", sanitize_keyword(keyword)), ("page", page.to_string())],
        )?;
        let body = self.core.fetch(url).await?;
        Ok(Page::inferred(self.core.dramas(&body), page, DEFAULT_PAGE_SIZE))
    }

    async fn get_detail(&self, book_id: &str) -> Result<Drama> {
        let url = self
            .core
            .url("detail", "/detail", &[], &[("bookId", book_id.to_string())])?;

        match self.core.fetch(url).await {
            Ok(body) => {
                let raw = unwrap_data(&body);
                let raw = raw.get("book").unwrap_or(raw);
                if has_metadata(raw) {
                    let mut drama = normalize_drama(raw, self.core.id());
                    drama.book_id = book_id.to_string();
                    return Ok(drama);
                }
            }
            Err(e) => {
                tracing::debug!(book_id, error = %e, "Sansekai detail endpoint failed");
            }
        }

        Ok(detail_via_search(self, book_id).await)
    }

    async fn get_episodes(&self, book_id: &str) -> Result<Vec<Episode>> {
        let url = self
            .core
            .url("episodes", "/allepisode", &[], &[("bookId", book_id.to_string())])?;
        let body = self.core.fetch(url).await?;
        Ok(self.core.episodes(&body))
    }

    async fn get_stream(&self, book_id: &str, chapter_id: &str) -> Result<Vec<QualityOption>> {
        // Episodes carry their videos; there is no dedicated stream endpoint.
        let episodes = self.get_episodes(book_id).await?;
        Ok(embedded_stream(&episodes, chapter_id).unwrap_or_default())
    }

    async fn get_trending(&self, page: u32) -> Result<Page<Drama>> {
        self.trending_page("trending", page, DEFAULT_PAGE_SIZE).await
    }

    async fn get_vip(&self, page: u32) -> Result<Page<Drama>> {
        let url = self
            .core
            .url("vip", "/vip", &[], &[("page", page.to_string())])?;
        let body = self.core.fetch(url).await?;
        Ok(Page::inferred(self.core.dramas(&body), page, DEFAULT_PAGE_SIZE))
    }

    fn resolve_url(&self, action: &str, params: &ProxyParams) -> Result<String> {
        let operation = operation_for_action(action);
        let default_path = format!("/{}", action);

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(book_id) = &params.book_id {
            query.push(("bookId", book_id.clone()));
        }
        if let Some(chapter_id) = &params.chapter_id {
            query.push(("chapterId", chapter_id.clone()));
        }
        if let Some(keyword) = &params.keyword {
            query.push(("query", sanitize_keyword(keyword)));
        }
        if let Some(page) = params.page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = params.size {
            query.push(("size", size.to_string()));
        }
        for (name, value) in &params.extra {
            query.push((name.as_str(), value.clone()));
        }

        self.core.url(operation, &default_path, &[], &query)
    }
}
