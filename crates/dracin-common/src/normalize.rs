//! Raw upstream JSON to canonical model.
//!
//! Normalization never fails. Each field walks a fallback chain of known
//! upstream spellings; provider-specific overrides run after the generic
//! chain. Input that is not an object produces a degraded value and a warning.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;
use tracing::warn;

use crate::ids;
use crate::model::{Drama, DramaStatus, Episode, QualityOption};
use crate::values::{
    as_f64, as_text, fix_url, is_absolute_url, parse_rating, parse_view_count, parse_year, pick,
    pick_text, pick_u32,
};

/// Quality assigned to a bare video URL with no declared resolution.
pub const FALLBACK_QUALITY: u32 = 720;

const BOOK_ID: &[&str] = &["bookId", "bookid", "book_id", "id"];
const BOOK_NAME: &[&str] = &["bookName", "bookname", "name", "title"];
const COVER: &[&str] = &["cover", "coverWap", "coverUrl", "bookCover", "thumbnail"];
const INTRODUCTION: &[&str] = &["introduction", "description", "desc", "synopsis"];
const YEAR: &[&str] = &["year", "releaseYear"];
const LATEST: &[&str] = &["latestEpisode", "lastChapterIndex", "latestChapter"];
const CHAPTER_COUNT: &[&str] = &["chapterCount", "totalChapter", "totalChapterNum", "chapterNum"];
const VIEWS: &[&str] = &["viewCount", "playCount", "views", "hotCount"];
const RATING: &[&str] = &["rating", "score"];
const CORNER: &[&str] = &["cornerLabel", "cornerName"];

const CHAPTER_ID: &[&str] = &["chapterId", "chapterid", "chapter_id", "vid", "id"];
const CHAPTER_INDEX: &[&str] = &["chapterIndex", "index", "episode", "num"];
const CHAPTER_NAME: &[&str] = &["chapterName", "name", "title"];
const VIDEO_URL: &[&str] = &["videoUrl", "video_url", "url", "videoPath", "playUrl"];
const QUALITY: &[&str] = &["quality", "definition", "resolution"];

// ----------------------------------------------------------------------------
// Dramas
// ----------------------------------------------------------------------------

/// Normalize one upstream drama record.
pub fn normalize_drama(raw: &Value, provider_id: &str) -> Drama {
    if !raw.is_object() {
        warn!(provider = provider_id, kind = "drama", "Degraded normalization: record is not an object");
        let book_id = as_text(raw)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback_book_id(raw, provider_id));
        return Drama::placeholder(&book_id);
    }

    let book_id = pick_text(raw, BOOK_ID);
    let id_missing = book_id.is_none();
    let chapter_count = pick_u32(raw, CHAPTER_COUNT);

    let mut drama = Drama {
        book_name: pick_text(raw, BOOK_NAME).unwrap_or_default(),
        cover: fix_url(&pick_text(raw, COVER).unwrap_or_default()),
        introduction: pick_text(raw, INTRODUCTION).unwrap_or_default(),
        genres: genres(raw),
        status: status(raw),
        year: parse_year(pick(raw, YEAR)),
        latest_episode: pick_u32(raw, LATEST).or(chapter_count).unwrap_or(0),
        chapter_count,
        view_count: pick(raw, VIEWS).map(parse_view_count).unwrap_or(0),
        rating: pick(raw, RATING).map(parse_rating).unwrap_or(0.0),
        corner_label: pick(raw, CORNER).and_then(corner_text),
        book_id: book_id.unwrap_or_else(|| fallback_book_id(raw, provider_id)),
    };

    apply_provider_overrides(&mut drama, raw, provider_id);

    if id_missing {
        warn!(provider = provider_id, book_id = %drama.book_id, "Degraded normalization: drama has no id");
    }
    drama
}

/// Stable synthetic id for records that carry none.
fn fallback_book_id(raw: &Value, provider_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    raw.to_string().hash(&mut hasher);
    format!("{}-{:016x}", provider_id, hasher.finish())
}

fn apply_provider_overrides(drama: &mut Drama, raw: &Value, provider_id: &str) {
    match provider_id {
        ids::SECONDARY => {
            // Tags arrive as objects carrying `tagName`.
            let tags = tag_names(raw.get("tags"));
            if !tags.is_empty() {
                drama.genres = tags;
            }
        }
        ids::BACKUP1 => {
            if let Some(label) = raw.get("corner").and_then(|c| c.get("name")).and_then(corner_text) {
                drama.corner_label = Some(label);
            }
            if let Some(episodes) = pick_u32(raw, &["episodes"]) {
                drama.chapter_count.get_or_insert(episodes);
                if drama.latest_episode == 0 {
                    drama.latest_episode = episodes;
                }
            }
            if drama.introduction.is_empty() {
                drama.introduction = pick_text(raw, &["intro"]).unwrap_or_default();
            }
        }
        ids::BACKUP2 => {
            if drama.corner_label.is_none() {
                drama.corner_label = raw.get("corner").and_then(corner_text);
            }
        }
        _ => {}
    }
}

fn genres(raw: &Value) -> Vec<String> {
    let from_genres = tag_names(raw.get("genres").or_else(|| raw.get("genre")));
    if !from_genres.is_empty() {
        return from_genres;
    }
    let from_tags = tag_names(raw.get("tags").or_else(|| raw.get("tagNames")));
    if !from_tags.is_empty() {
        return from_tags;
    }
    // Some upstreams send a single comma-separated string.
    raw.get("genres")
        .or_else(|| raw.get("genre"))
        .and_then(Value::as_str)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Strings of an array whose entries are plain strings or `{tagName|name}` objects.
fn tag_names(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => pick_text(item, &["tagName", "name"]),
            _ => None,
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn status(raw: &Value) -> DramaStatus {
    let completed_flag = ["finished", "isFinish", "isFinished", "completed"]
        .iter()
        .filter_map(|key| raw.get(key))
        .any(|v| v.as_bool() == Some(true) || v.as_i64() == Some(1));

    let completed_text = ["status", "finishStatus"]
        .iter()
        .filter_map(|key| raw.get(key).and_then(Value::as_str))
        .any(|s| {
            let s = s.to_ascii_lowercase();
            s == "completed" || s == "complete" || s == "finished" || s == "end"
        });

    if completed_flag || completed_text {
        DramaStatus::Completed
    } else {
        DramaStatus::Ongoing
    }
}

fn corner_text(value: &Value) -> Option<String> {
    as_text(value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ----------------------------------------------------------------------------
// Episodes
// ----------------------------------------------------------------------------

/// Normalize one upstream episode record.
///
/// `position` is the zero-based position of the record within its list and
/// supplies the index when the upstream omits one.
pub fn normalize_episode(raw: &Value, provider_id: &str, position: usize) -> Episode {
    if !raw.is_object() {
        warn!(provider = provider_id, kind = "episode", position, "Degraded normalization: record is not an object");
    }

    // Some upstreams count from zero, so a literal 0 is kept.
    let chapter_index = CHAPTER_INDEX
        .iter()
        .filter_map(|key| raw.get(key))
        .find_map(|value| as_f64(value).filter(|n| n.is_finite() && *n >= 0.0))
        .map(|n| n.min(u32::MAX as f64) as u32)
        .unwrap_or(position as u32 + 1);

    let chapter_id = pick_text(raw, CHAPTER_ID).unwrap_or_else(|| chapter_index.to_string());
    let chapter_name = pick_text(raw, CHAPTER_NAME)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Episode {}", chapter_index));
    let cover = pick_text(raw, &["cover", "chapterImg", "coverUrl"])
        .map(|c| fix_url(&c))
        .filter(|c| !c.is_empty());

    let quality_options = finalize_quality_options(parse_stream_options(raw));
    let video_url = quality_options
        .first()
        .map(|q| q.video_url.clone())
        .unwrap_or_default();

    Episode {
        chapter_id,
        chapter_index,
        chapter_name,
        cover,
        video_url,
        quality_options,
    }
}

/// Collect every playable rendition described by a stream or episode payload.
///
/// Recognized sources, in order: a direct `videoUrl`, a `qualities` list, and
/// `cdnList` entries (either `{cdnDomain, videoPathList}` or a plain `url`).
/// CDN paths are prefixed with `https://{cdnDomain}` only when not already
/// absolute. Duplicate URLs are dropped. The result is not yet ordered.
pub fn parse_stream_options(raw: &Value) -> Vec<QualityOption> {
    let mut options: Vec<QualityOption> = Vec::new();
    let mut push = |quality: u32, url: String| {
        if !url.is_empty() && !options.iter().any(|o| o.video_url == url) {
            options.push(QualityOption::new(quality, url));
        }
    };

    if let Some(url) = pick_text(raw, VIDEO_URL) {
        push(quality_of(raw), fix_url(&url));
    }

    for key in ["qualities", "qualityList", "videoList"] {
        for entry in raw.get(key).and_then(Value::as_array).into_iter().flatten() {
            if let Some(url) = pick_text(entry, VIDEO_URL) {
                push(quality_of(entry), fix_url(&url));
            }
        }
    }

    for cdn in raw.get("cdnList").and_then(Value::as_array).into_iter().flatten() {
        let domain = pick_text(cdn, &["cdnDomain", "domain"]).unwrap_or_default();
        let paths = cdn.get("videoPathList").and_then(Value::as_array);

        match paths {
            Some(paths) => {
                for path in paths {
                    let Some(video_path) = pick_text(path, &["videoPath", "path", "url"]) else {
                        continue;
                    };
                    push(quality_of(path), join_cdn(&domain, &video_path));
                }
            }
            None => {
                if let Some(url) = pick_text(cdn, &["url", "videoUrl", "videoPath"]) {
                    push(quality_of(cdn), join_cdn(&domain, &url));
                }
            }
        }
    }

    options
}

/// Order options from highest to lowest quality and mark the first as default.
///
/// The sort is stable, so equal qualities keep upstream order.
pub fn finalize_quality_options(mut options: Vec<QualityOption>) -> Vec<QualityOption> {
    options.sort_by(|a, b| b.quality.cmp(&a.quality));
    for (i, option) in options.iter_mut().enumerate() {
        option.is_default = i == 0;
    }
    options
}

fn quality_of(raw: &Value) -> u32 {
    pick(raw, QUALITY)
        .and_then(as_f64)
        .filter(|q| q.is_finite() && *q > 0.0)
        .map(|q| q as u32)
        .unwrap_or(FALLBACK_QUALITY)
}

fn join_cdn(domain: &str, path: &str) -> String {
    let path = path.trim();
    if is_absolute_url(path) || domain.is_empty() {
        return fix_url(path);
    }
    let domain = domain
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{}/{}", domain, path.trim_start_matches('/'))
}
