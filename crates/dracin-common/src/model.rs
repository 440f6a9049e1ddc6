//! Canonical catalog types shared by every provider.
//!
//! Serialized field names are camelCase so the gateway's JSON matches what
//! the catalog front-end already consumes.

use serde::{Deserialize, Serialize};

use crate::values::current_year;

/// Airing state of a drama.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DramaStatus {
    #[default]
    Ongoing,
    Completed,
}

impl std::fmt::Display for DramaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ongoing => write!(f, "Ongoing"),
            Self::Completed => write!(f, "Completed"),
        }
    }
}

/// A drama series in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drama {
    pub book_id: String,
    pub book_name: String,
    /// Absolute cover URL, or empty.
    pub cover: String,
    pub introduction: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub status: DramaStatus,
    pub year: i32,
    #[serde(default)]
    pub latest_episode: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_count: Option<u32>,
    #[serde(default)]
    pub view_count: u64,
    /// Always within 0.0..=10.0, one decimal place.
    #[serde(default)]
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_label: Option<String>,
}

impl Drama {
    /// Degraded but valid detail used when every lookup strategy failed.
    pub fn placeholder(book_id: &str) -> Self {
        Self {
            book_id: book_id.to_string(),
            book_name: format!("Drama {}", book_id),
            cover: String::new(),
            introduction: String::new(),
            genres: Vec::new(),
            status: DramaStatus::Ongoing,
            year: current_year(),
            latest_episode: 0,
            chapter_count: None,
            view_count: 0,
            rating: 0.0,
            corner_label: None,
        }
    }

    /// Whether this value came from [`Drama::placeholder`] (or looks like it).
    pub fn is_placeholder(&self) -> bool {
        self.introduction.is_empty()
            && self.cover.is_empty()
            && self.book_name == format!("Drama {}", self.book_id)
    }
}

/// One playable rendition of an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityOption {
    /// Vertical resolution, e.g. 1080 or 720.
    pub quality: u32,
    pub video_url: String,
    #[serde(default)]
    pub is_default: bool,
}

impl QualityOption {
    pub fn new(quality: u32, video_url: impl Into<String>) -> Self {
        Self {
            quality,
            video_url: video_url.into(),
            is_default: false,
        }
    }
}

/// A single episode of a drama.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub chapter_id: String,
    pub chapter_index: u32,
    pub chapter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// URL of the default quality option, or empty when nothing is playable.
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub quality_options: Vec<QualityOption>,
}

impl Episode {
    /// The option flagged as default, if any.
    pub fn default_option(&self) -> Option<&QualityOption> {
        self.quality_options.iter().find(|q| q.is_default)
    }

    pub fn is_playable(&self) -> bool {
        !self.video_url.is_empty()
    }
}

/// Lightweight episode entry returned by list mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub chapter_id: String,
    pub chapter_index: u32,
    pub chapter_name: String,
}

impl From<&Episode> for EpisodeSummary {
    fn from(ep: &Episode) -> Self {
        Self {
            chapter_id: ep.chapter_id.clone(),
            chapter_index: ep.chapter_index,
            chapter_name: ep.chapter_name.clone(),
        }
    }
}

/// Paging metadata of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl Pagination {
    /// Pagination reported explicitly by the upstream.
    pub fn explicit(page: u32, size: u32, has_more: bool, total: Option<u64>) -> Self {
        Self {
            page,
            size,
            has_more,
            total,
        }
    }

    /// Pagination inferred from the number of returned items.
    ///
    /// A full page implies more may follow.
    pub fn inferred(page: u32, size: u32, returned: usize) -> Self {
        Self {
            page,
            size,
            has_more: size > 0 && returned >= size as usize,
            total: None,
        }
    }
}

/// A page of items plus its pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: Pagination) -> Self {
        Self { items, pagination }
    }

    /// Page with inferred pagination.
    pub fn inferred(items: Vec<T>, page: u32, size: u32) -> Self {
        let pagination = Pagination::inferred(page, size, items.len());
        Self { items, pagination }
    }

    pub fn empty(page: u32, size: u32) -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::explicit(page, size, false, None),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A browsable category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drama_serializes_camel_case() {
        let mut drama = Drama::placeholder("7");
        drama.chapter_count = Some(60);
        let json = serde_json::to_value(&drama).unwrap();

        assert_eq!(json["bookId"], "7");
        assert_eq!(json["bookName"], "Drama 7");
        assert_eq!(json["chapterCount"], 60);
        assert_eq!(json["status"], "Ongoing");
        assert!(json.get("cornerLabel").is_none());
    }

    #[test]
    fn test_placeholder() {
        let drama = Drama::placeholder("abc");
        assert_eq!(drama.book_id, "abc");
        assert_eq!(drama.rating, 0.0);
        assert!(drama.introduction.is_empty());
        assert_eq!(drama.year, current_year());
        assert!(drama.is_placeholder());
    }

    #[test]
    fn test_inferred_pagination() {
        assert!(Pagination::inferred(1, 10, 10).has_more);
        assert!(!Pagination::inferred(1, 10, 9).has_more);
        assert!(!Pagination::inferred(1, 0, 0).has_more);
    }

    #[test]
    fn test_episode_summary_from_episode() {
        let ep = Episode {
            chapter_id: "c1".into(),
            chapter_index: 3,
            chapter_name: "Episode 3".into(),
            cover: None,
            video_url: "https://cdn/3.mp4".into(),
            quality_options: vec![],
        };
        let summary = EpisodeSummary::from(&ep);
        assert_eq!(summary.chapter_id, "c1");
        assert_eq!(summary.chapter_index, 3);
        assert!(ep.is_playable());
    }
}
