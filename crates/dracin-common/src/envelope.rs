//! Extraction of item lists from upstream response envelopes.
//!
//! Upstreams wrap lists in many shapes. Each shape is a named strategy; the
//! first strategy that recognizes the payload wins. Adding a shape means
//! adding an entry to [`LIST_EXTRACTORS`].

use serde_json::Value;

/// A single envelope shape: returns the contained items if it recognizes `raw`.
#[derive(Clone, Copy)]
pub struct ListExtractor {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<Vec<&Value>>,
}

impl std::fmt::Debug for ListExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListExtractor").field("name", &self.name).finish()
    }
}

/// Recognized envelope shapes, tried in order.
pub const LIST_EXTRACTORS: &[ListExtractor] = &[
    ListExtractor { name: "array", extract: bare_array },
    ListExtractor { name: "data", extract: data_array },
    ListExtractor { name: "data.list", extract: data_list },
    ListExtractor { name: "data.chapters", extract: data_chapters },
    ListExtractor { name: "list", extract: root_list },
    ListExtractor { name: "bookList", extract: root_book_list },
    ListExtractor { name: "data.bookList", extract: data_book_list },
    ListExtractor { name: "columnVoList", extract: column_sections },
];

/// Items of `raw` using the default strategy order. Unknown shapes yield nothing.
pub fn extract_list(raw: &Value) -> Vec<&Value> {
    extract_with(raw, LIST_EXTRACTORS)
}

/// Items of `raw` using a caller-chosen strategy order.
pub fn extract_with<'a>(raw: &'a Value, extractors: &[ListExtractor]) -> Vec<&'a Value> {
    extractors
        .iter()
        .find_map(|extractor| (extractor.extract)(raw))
        .unwrap_or_default()
}

/// Name of the first strategy that recognizes `raw`.
pub fn detect_shape(raw: &Value) -> Option<&'static str> {
    LIST_EXTRACTORS
        .iter()
        .find(|extractor| (extractor.extract)(raw).is_some())
        .map(|extractor| extractor.name)
}

/// The `data` member when it is an object, else `raw` itself.
pub fn unwrap_data(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(data @ Value::Object(_)) => data,
        _ => raw,
    }
}

fn array_at<'a>(raw: &'a Value, path: &[&str]) -> Option<Vec<&'a Value>> {
    let mut node = raw;
    for key in path {
        node = node.get(key)?;
    }
    node.as_array().map(|items| items.iter().collect())
}

fn bare_array(raw: &Value) -> Option<Vec<&Value>> {
    raw.as_array().map(|items| items.iter().collect())
}

fn data_array(raw: &Value) -> Option<Vec<&Value>> {
    array_at(raw, &["data"])
}

fn data_list(raw: &Value) -> Option<Vec<&Value>> {
    array_at(raw, &["data", "list"])
}

fn data_chapters(raw: &Value) -> Option<Vec<&Value>> {
    array_at(raw, &["data", "chapters"])
}

fn root_list(raw: &Value) -> Option<Vec<&Value>> {
    array_at(raw, &["list"])
}

fn root_book_list(raw: &Value) -> Option<Vec<&Value>> {
    array_at(raw, &["bookList"])
}

fn data_book_list(raw: &Value) -> Option<Vec<&Value>> {
    array_at(raw, &["data", "bookList"])
}

/// Sectioned listings: each section carries `bookList` or `bookInfoList`.
/// Sections are concatenated in order.
fn column_sections(raw: &Value) -> Option<Vec<&Value>> {
    let sections = raw
        .get("columnVoList")
        .or_else(|| raw.get("data").and_then(|d| d.get("columnVoList")))?
        .as_array()?;

    Some(
        sections
            .iter()
            .filter_map(|section| {
                section
                    .get("bookList")
                    .and_then(Value::as_array)
                    .or_else(|| section.get("bookInfoList").and_then(Value::as_array))
            })
            .flatten()
            .collect(),
    )
}
