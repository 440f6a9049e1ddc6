//! The uniform capability interface implemented once per upstream provider.
//!
//! Adapters issue every upstream call through the shared [`Governor`] and
//! never retry on their own. They degrade instead of failing where the
//! catalog can still render something useful: detail lookups fall back to
//! other metadata sources and finally to a placeholder.

use std::sync::Arc;

use async_trait::async_trait;
use dracin_common::envelope::extract_list;
use dracin_common::{
    normalize_drama, normalize_episode, Category, Drama, Episode, Page, QualityOption, Result,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::governor::{Governor, OutboundRequest};

use super::url::build_url;

/// Page size used where a provider does not take one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Longest keyword forwarded upstream, in characters.
pub const MAX_KEYWORD_CHARS: usize = 100;

/// Parameters of a proxied operation, in the gateway's own vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyParams {
    pub book_id: Option<String>,
    pub chapter_id: Option<String>,
    pub keyword: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    /// Any other query parameters, forwarded unchanged.
    pub extra: Vec<(String, String)>,
}

impl ProxyParams {
    pub fn page_or_default(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn size_or_default(&self) -> u32 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }
}

/// Trim a search keyword and cap its length.
pub fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .take(MAX_KEYWORD_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Operation key in the provider endpoint table for a proxy action.
pub fn operation_for_action(action: &str) -> &str {
    match action {
        "allepisode" | "chapters" | "episodes" => "episodes",
        other => other,
    }
}

/// Capability interface every upstream provider implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Static descriptor this adapter was built from.
    fn config(&self) -> &ProviderConfig;

    fn provider_id(&self) -> &str {
        &self.config().id
    }

    fn provider_name(&self) -> &str {
        &self.config().name
    }

    async fn get_home(&self, page: u32, size: u32) -> Result<Page<Drama>>;

    async fn search(&self, keyword: &str, page: u32) -> Result<Page<Drama>>;

    /// Metadata of one drama. Never fails: the last resort is a placeholder.
    async fn get_detail(&self, book_id: &str) -> Result<Drama>;

    async fn get_episodes(&self, book_id: &str) -> Result<Vec<Episode>>;

    /// Playable renditions of one episode, highest quality first. Empty when
    /// nothing is playable.
    async fn get_stream(&self, book_id: &str, chapter_id: &str) -> Result<Vec<QualityOption>>;

    async fn get_trending(&self, page: u32) -> Result<Page<Drama>>;

    async fn get_vip(&self, page: u32) -> Result<Page<Drama>>;

    async fn get_categories(&self) -> Result<Vec<Category>> {
        Ok(Vec::new())
    }

    /// Minimal home call; any failure counts as unhealthy.
    async fn health_check(&self) -> bool {
        match self.get_home(1, 1).await {
            Ok(_) => true,
            Err(e) => {
                debug!(provider = self.provider_id(), error = %e, "Health check failed");
                false
            }
        }
    }

    /// Upstream URL serving a raw proxied `action`.
    fn resolve_url(&self, action: &str, params: &ProxyParams) -> Result<String>;
}

// ----------------------------------------------------------------------------
// Shared plumbing
// ----------------------------------------------------------------------------

/// Configuration plus governor handle shared by the concrete adapters.
#[derive(Clone)]
pub struct AdapterCore {
    pub config: ProviderConfig,
    pub governor: Governor,
}

impl AdapterCore {
    pub fn new(config: ProviderConfig, governor: Governor) -> Self {
        Self { config, governor }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// `base + endpoint(operation)` plus extra path segments and query pairs.
    pub fn url(
        &self,
        operation: &str,
        default_path: &str,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<String> {
        let path = self.config.endpoint(operation, default_path);
        build_url(self.config.base(), path, segments, query)
    }

    /// Governed GET of a JSON body with the provider's headers.
    pub async fn fetch(&self, url: String) -> Result<Arc<Value>> {
        let request = OutboundRequest::get(url).headers(self.config.headers.iter());
        self.governor.fetch_json(request).await
    }

    /// Normalized dramas of a list payload.
    pub fn dramas(&self, body: &Value) -> Vec<Drama> {
        extract_list(body)
            .into_iter()
            .map(|raw| normalize_drama(raw, self.id()))
            .collect()
    }

    /// Normalized episodes of a list payload.
    pub fn episodes(&self, body: &Value) -> Vec<Episode> {
        extract_list(body)
            .into_iter()
            .enumerate()
            .map(|(position, raw)| normalize_episode(raw, self.id(), position))
            .collect()
    }
}

/// Whether a detail payload actually carries drama metadata.
pub fn has_metadata(raw: &Value) -> bool {
    ["bookName", "bookname", "name", "title"]
        .iter()
        .any(|key| raw.get(key).and_then(Value::as_str).is_some_and(|s| !s.is_empty()))
}

/// Metadata fallback: search by id, then a placeholder.
///
/// A search hit whose id matches wins; otherwise the first hit is used.
pub async fn detail_via_search<A>(adapter: &A, book_id: &str) -> Drama
where
    A: ProviderAdapter + ?Sized,
{
    match adapter.search(book_id, 1).await {
        Ok(page) => {
            let mut items = page.items;
            if let Some(pos) = items.iter().position(|d| d.book_id == book_id) {
                return items.swap_remove(pos);
            }
            if let Some(first) = items.into_iter().next() {
                debug!(
                    provider = adapter.provider_id(),
                    book_id, "Detail fallback using first search hit"
                );
                return first;
            }
        }
        Err(e) => {
            debug!(provider = adapter.provider_id(), book_id, error = %e, "Detail search fallback failed");
        }
    }

    warn!(
        provider = adapter.provider_id(),
        book_id, "Degraded normalization: serving placeholder detail"
    );
    Drama::placeholder(book_id)
}

/// Options of the episode matching `chapter_id`, if any are embedded.
pub fn embedded_stream(episodes: &[Episode], chapter_id: &str) -> Option<Vec<QualityOption>> {
    episodes
        .iter()
        .find(|ep| ep.chapter_id == chapter_id)
        .map(|ep| ep.quality_options.clone())
        .filter(|options| !options.is_empty())
}
