//! Upstream URL construction.

use dracin_common::{Error, Result};
use url::Url;

/// Join `base` and `path`, push percent-encoded `segments`, then append `query`.
///
/// `path` may itself start with `?` for providers addressed purely by query.
pub fn build_url(base: &str, path: &str, segments: &[&str], query: &[(&str, String)]) -> Result<String> {
    let joined = if path.is_empty() || path.starts_with('/') || path.starts_with('?') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };

    let mut url = Url::parse(&joined)
        .map_err(|e| Error::config(format!("invalid upstream URL {}: {}", joined, e)))?;

    if !segments.is_empty() {
        let mut path_segments = url
            .path_segments_mut()
            .map_err(|_| Error::config(format!("upstream URL cannot take path segments: {}", joined)))?;
        path_segments.pop_if_empty();
        for segment in segments {
            path_segments.push(segment);
        }
    }

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query {
            pairs.append_pair(name, value);
        }
    }

    Ok(url.into())
}
