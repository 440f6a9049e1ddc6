//! Bounded favorites collection.

use serde::{Deserialize, Serialize};

use crate::model::Drama;

/// Maximum number of favorites kept; the oldest are dropped first.
pub const MAX_FAVORITES: usize = 100;

/// A favorited drama and when it was added (unix milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteItem {
    #[serde(flatten)]
    pub drama: Drama,
    pub added_at: i64,
}

/// Favorites ordered newest first, unique by `bookId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FavoriteItem>", into = "Vec<FavoriteItem>")]
pub struct FavoriteList {
    items: Vec<FavoriteItem>,
}

impl FavoriteList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[FavoriteItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, book_id: &str) -> bool {
        self.items.iter().any(|item| item.drama.book_id == book_id)
    }

    /// Add `drama` at the front. Returns `false` if it was already present.
    pub fn add(&mut self, drama: Drama, now_ms: i64) -> bool {
        if self.contains(&drama.book_id) {
            return false;
        }
        self.items.insert(
            0,
            FavoriteItem {
                drama,
                added_at: now_ms,
            },
        );
        self.items.truncate(MAX_FAVORITES);
        true
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, book_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.drama.book_id != book_id);
        self.items.len() != before
    }

    /// Add if absent, remove if present. Returns `true` when the drama is now a favorite.
    pub fn toggle(&mut self, drama: Drama, now_ms: i64) -> bool {
        if self.remove(&drama.book_id) {
            false
        } else {
            self.add(drama, now_ms)
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl From<Vec<FavoriteItem>> for FavoriteList {
    /// Rebuild the invariants from possibly stale persisted data.
    fn from(mut items: Vec<FavoriteItem>) -> Self {
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        let mut seen = std::collections::HashSet::new();
        items.retain(|item| seen.insert(item.drama.book_id.clone()));
        items.truncate(MAX_FAVORITES);
        Self { items }
    }
}

impl From<FavoriteList> for Vec<FavoriteItem> {
    fn from(list: FavoriteList) -> Self {
        list.items
    }
}
