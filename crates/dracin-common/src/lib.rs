//! Dracin-Common: canonical catalog model and provider-independent helpers.
//!
//! This crate provides the pieces every provider adapter shares:
//!
//! - **Model**: [`Drama`], [`Episode`], [`QualityOption`], pagination envelopes
//! - **Normalizer**: total functions turning raw upstream JSON into the model
//! - **Envelopes**: ordered list-extraction strategies for upstream payloads
//! - **Values**: URL, rating, view-count and year coercions
//! - **Favorites**: the bounded, de-duplicated favorites collection
//! - **Error Handling**: the unified [`Error`] type and [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use dracin_common::{normalize_drama, ids, DramaStatus};
//! use serde_json::json;
//!
//! let raw = json!({ "bookid": "42", "bookName": "Moonlit", "score": 85, "finished": true });
//! let drama = normalize_drama(&raw, ids::SECONDARY);
//!
//! assert_eq!(drama.book_id, "42");
//! assert_eq!(drama.rating, 8.5);
//! assert_eq!(drama.status, DramaStatus::Completed);
//! ```

pub mod envelope;
pub mod error;
pub mod favorites;
pub mod ids;
pub mod model;
pub mod normalize;
pub mod values;

pub use error::{Error, Result};
pub use favorites::{FavoriteItem, FavoriteList, MAX_FAVORITES};
pub use model::*;
pub use normalize::{finalize_quality_options, normalize_drama, normalize_episode, parse_stream_options};
