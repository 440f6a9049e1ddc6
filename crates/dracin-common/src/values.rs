//! Value coercions applied to loosely-typed upstream JSON.
//!
//! Every function here is total: malformed input degrades to a neutral value
//! rather than failing.

use chrono::Datelike;
use serde_json::Value;

/// Current calendar year (UTC).
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

// ----------------------------------------------------------------------------
// JSON field access
// ----------------------------------------------------------------------------

/// Whether a value counts as present when walking a fallback chain.
///
/// `null`, `false`, `0`, empty strings and `NaN` are treated as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First present value among `keys`.
pub fn pick<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find(|value| is_truthy(value))
}

/// Render a scalar as text. Numbers keep their JSON form.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First present value among `keys`, rendered as text.
pub fn pick_text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .filter(|value| is_truthy(value))
        .find_map(as_text)
}

/// Numeric reading of a value; strings are parsed by their leading number.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
}

/// First present value among `keys`, read as a number.
pub fn pick_f64(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .filter(|value| is_truthy(value))
        .find_map(as_f64)
}

/// First present value among `keys`, read as a non-negative integer.
pub fn pick_u32(raw: &Value, keys: &[&str]) -> Option<u32> {
    pick_f64(raw, keys)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.min(u32::MAX as f64) as u32)
}

/// Parse the longest leading decimal number of `s`, ignoring leading whitespace.
///
/// `"8.7 / 10"` reads as `8.7`; `"N/A"` reads as nothing.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || digits > 0 {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }
    s[..end].parse().ok()
}

// ----------------------------------------------------------------------------
// Domain coercions
// ----------------------------------------------------------------------------

/// Make a URL absolute.
///
/// Protocol-relative URLs get `https:`, scheme-less hosts get `https://`,
/// empty input stays empty.
pub fn fix_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        String::new()
    } else if url.starts_with("//") {
        format!("https:{}", url)
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Whether a path already carries a scheme or is protocol-relative.
pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

/// Normalize a rating onto a 0.0 to 10.0 scale with one decimal.
///
/// Values above 10 are taken to be on a 100-point scale.
pub fn parse_rating(value: &Value) -> f64 {
    let Some(mut rating) = as_f64(value).filter(|r| r.is_finite()) else {
        return 0.0;
    };
    if rating > 10.0 {
        rating /= 10.0;
    }
    let rating = rating.clamp(0.0, 10.0);
    (rating * 10.0).round() / 10.0
}

/// Parse a view count, honoring `k`/`K` (thousand) and `m`/`M` (million) suffixes.
pub fn parse_view_count(value: &Value) -> u64 {
    let count = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            let base = parse_float_prefix(s).unwrap_or(0.0);
            match s.chars().last() {
                Some('k' | 'K') => base * 1_000.0,
                Some('m' | 'M') => base * 1_000_000.0,
                _ => base,
            }
        }
        _ => 0.0,
    };
    if count.is_finite() && count > 0.0 {
        count.round() as u64
    } else {
        0
    }
}

/// Compact display form of a view count: `1.5K`, `2.3M`, or the plain number.
pub fn format_view_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Parse a release year, falling back to the current year.
pub fn parse_year(value: Option<&Value>) -> i32 {
    value
        .and_then(as_f64)
        .filter(|y| y.is_finite() && *y >= 1900.0 && *y <= 9999.0)
        .map(|y| y as i32)
        .unwrap_or_else(current_year)
}
