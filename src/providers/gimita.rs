//! Gimita upstream: one base URL, the operation travels as `?action=`.

use async_trait::async_trait;
use dracin_common::envelope::unwrap_data;
use dracin_common::{
    finalize_quality_options, parse_stream_options, Drama, Episode, Page, Pagination,
    QualityOption, Result,
};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::governor::Governor;

use super::adapter::{
    detail_via_search, embedded_stream, sanitize_keyword, AdapterCore, ProviderAdapter,
    ProxyParams, DEFAULT_PAGE_SIZE,
};
use super::url::build_url;

pub struct GimitaAdapter {
    core: AdapterCore,
}

impl GimitaAdapter {
    pub fn new(config: ProviderConfig, governor: Governor) -> Self {
        Self {
            core: AdapterCore::new(config, governor),
        }
    }

    /// Upstream action name for a gateway operation.
    fn action<'a>(&'a self, operation: &'a str) -> &'a str {
        let default = match operation {
            "episodes" | "allepisode" => "chapters",
            "trending" => "home",
            "foryou" => "recommend",
            other => other,
        };
        self.core.config.endpoint(operation, default)
    }

    fn action_url(&self, operation: &str, params: &[(&str, String)]) -> Result<String> {
        let mut query = vec![("action", self.action(operation).to_string())];
        query.extend(params.iter().cloned());
        build_url(self.core.config.base(), "", &[], &query)
    }

    async fn home_page(&self, operation: &str, page: u32, size: u32) -> Result<Page<Drama>> {
        let url = self.action_url(
            operation,
            &[("page", page.to_string()), ("size", size.to_string())],
        )?;
        let body = self.core.fetch(url).await?;
        let items = self.core.dramas(&body);

        let total = body.get("total").and_then(|t| t.as_u64());
        let mut pagination = Pagination::inferred(page, size, items.len());
        pagination.total = total;
        Ok(Page::new(items, pagination))
    }
}

#[async_trait]
impl ProviderAdapter for GimitaAdapter {
    fn config(&self) -> &ProviderConfig {
        &self.core.config
    }

    async fn get_home(&self, page: u32, size: u32) -> Result<Page<Drama>> {
        self.home_page("home", page, size).await
    }

    async fn search(&self, keyword: &str, page: u32) -> Result<Page<Drama>> {
        let url = self.action_url(
            "search",
            &[("query", sanitize_keyword(keyword)), ("page", page.to_string())],
        )?;
        let body = self.core.fetch(url).await?;
        Ok(Page::inferred(self.core.dramas(&body), page, DEFAULT_PAGE_SIZE))
    }

    /// The detail action only returns chapters, so metadata comes from search.
    async fn get_detail(&self, book_id: &str) -> Result<Drama> {
        Ok(detail_via_search(self, book_id).await)
    }

    async fn get_episodes(&self, book_id: &str) -> Result<Vec<Episode>> {
        let url = self.action_url("episodes", &[("book_id", book_id.to_string())])?;
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
            Err(e) => debug!(book_id, error = %e, "Gimita chapter list unavailable for stream"),
        }

        let url = self.action_url(
            "stream",
            &[
                ("book_id", book_id.to_string()),
                ("chapter_id", chapter_id.to_string()),
            ],
        )?;
        let body = self.core.fetch(url).await?;
        Ok(finalize_quality_options(parse_stream_options(unwrap_data(&body))))
    }

    async fn get_trending(&self, page: u32) -> Result<Page<Drama>> {
        self.home_page("trending", page, DEFAULT_PAGE_SIZE).await
    }

    async fn get_vip(&self, page: u32) -> Result<Page<Drama>> {
        // The vip action is not paginated.
        let url = self.action_url("vip", &[])?;
        let body = self.core.fetch(url).await?;
        let items = self.core.dramas(&body);
        let size = items.len() as u32;
        Ok(Page::new(items, Pagination::explicit(page, size, false, None)))
    }

    fn resolve_url(&self, action: &str, params: &ProxyParams) -> Result<String> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(book_id) = &params.book_id {
            query.push(("book_id", book_id.clone()));
        }
        if let Some(chapter_id) = &params.chapter_id {
            query.push(("chapter_id", chapter_id.clone()));
        }
        if let Some(keyword) = &params.keyword {
            query.push(("query", sanitize_keyword(keyword)));
        }
        if action != "vip" {
            if let Some(page) = params.page {
                query.push(("page", page.to_string()));
            }
            if let Some(size) = params.size {
                query.push(("size", size.to_string()));
            }
        }
        for (name, value) in &params.extra {
            query.push((name.as_str(), value.clone()));
        }

        self.action_url(action, &query)
    }
}
