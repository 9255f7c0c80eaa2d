//! Result extraction for responses with no fixed asset path.
//!
//! Vendors bury the generated asset at different depths and inside
//! differently-shaped arrays. When no path can be configured, recency is the
//! only reliable signal: collect every URL-bearing node, then keep the ones
//! carrying the newest timestamp.

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s`"']+"#).expect("url pattern is valid"));

/// Timestamp keys checked on an asset node, in priority order.
const TIMESTAMP_KEYS: [&str; 6] = [
    "createTimestamp",
    "created_at",
    "createdAt",
    "createTime",
    "updated_at",
    "updateTime",
];

struct Candidate {
    url: String,
    ts: f64,
}

/// Collect the newest asset URLs anywhere in `root`.
///
/// Returns de-duplicated URLs (first-seen order) whose timestamp equals the
/// maximum observed, or every URL when no node carried a timestamp.
pub fn extract_latest_assets(root: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect(root, &mut found);

    let max_ts = found.iter().map(|c| c.ts).fold(0.0_f64, f64::max);
    let mut urls: Vec<String> = Vec::new();
    for candidate in found {
        if max_ts > 0.0 && candidate.ts != max_ts {
            continue;
        }
        if !urls.contains(&candidate.url) {
            urls.push(candidate.url);
        }
    }
    urls
}

fn collect(node: &Value, out: &mut Vec<Candidate>) {
    match node {
        Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
        Value::Object(map) => {
            if let Some(raw) = url_field(map) {
                let url = sanitize_url(raw);
                if !url.is_empty() {
                    out.push(Candidate {
                        url,
                        ts: timestamp_of(map),
                    });
                }
            }
            map.values().for_each(|child| collect(child, out));
        }
        _ => {}
    }
}

fn url_field(map: &Map<String, Value>) -> Option<&str> {
    let raw = map
        .get("imageUrl")
        .and_then(Value::as_str)
        .or_else(|| map.get("url").and_then(Value::as_str))?;
    raw.contains("http").then_some(raw)
}

fn timestamp_of(map: &Map<String, Value>) -> f64 {
    let raw = TIMESTAMP_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|v| is_truthy(v));
    match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_timestamp(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Parse a string timestamp into epoch milliseconds.
fn parse_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n as f64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.timestamp_millis() as f64);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

/// Trim, strip wrapping backticks and remove all whitespace.
pub fn clean_url(raw: &str) -> String {
    raw.trim()
        .trim_matches('`')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Reduce a URL-bearing string to just the URL.
pub fn sanitize_url(raw: &str) -> String {
    match URL_PATTERN.find(raw) {
        Some(m) => m.as_str().trim().to_string(),
        None => clean_url(raw),
    }
}

fn is_url_like(s: &str) -> bool {
    s.contains("http://") || s.contains("https://") || s.trim().starts_with("data:image/")
}

/// Sanitize every URL-shaped string in a JSON tree, leaving other leaves alone.
pub fn sanitize_urls_deep(node: &Value) -> Value {
    match node {
        Value::String(s) if is_url_like(s) => Value::String(sanitize_url(s)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_urls_deep).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_urls_deep(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keeps_only_newest_timestamp() {
        let root = json!({
            "data": {
                "images": [
                    {"imageUrl": "https://cdn/old.png", "createTimestamp": 100},
                    {"imageUrl": "https://cdn/new.png", "createTimestamp": 200}
                ]
            }
        });
        assert_eq!(extract_latest_assets(&root), vec!["https://cdn/new.png"]);
    }

    #[test]
    fn test_returns_all_without_timestamps() {
        let root = json!([
            {"url": "https://cdn/a.png"},
            {"nested": {"url": "https://cdn/b.png"}}
        ]);
        assert_eq!(
            extract_latest_assets(&root),
            vec!["https://cdn/a.png", "https://cdn/b.png"]
        );
    }

    #[test]
    fn test_deduplicates_urls() {
        let root = json!({
            "a": {"url": "https://cdn/x.png", "created_at": 5},
            "b": [{"imageUrl": "https://cdn/x.png", "createdAt": 5}]
        });
        assert_eq!(extract_latest_assets(&root), vec!["https://cdn/x.png"]);
    }

    #[test]
    fn test_string_timestamps_are_parsed() {
        let root = json!([
            {"url": "https://cdn/a.png", "createTime": "2024-01-01T00:00:00Z"},
            {"url": "https://cdn/b.png", "createTime": "2024-06-01 12:00:00"},
            {"url": "https://cdn/c.png", "createTime": "not a date"}
        ]);
        assert_eq!(extract_latest_assets(&root), vec!["https://cdn/b.png"]);
    }

    #[test]
    fn test_ignores_non_http_urls() {
        let root = json!({"url": "/relative/path.png", "child": {"imageUrl": "ftp://x"}});
        assert!(extract_latest_assets(&root).is_empty());
    }

    #[test]
    fn test_image_url_preferred_over_url() {
        let root = json!({"imageUrl": "https://cdn/img.png", "url": "https://cdn/page"});
        assert_eq!(extract_latest_assets(&root), vec!["https://cdn/img.png"]);
    }

    #[test]
    fn test_sanitize_strips_prose_and_backticks() {
        assert_eq!(
            sanitize_url("here it is: https://cdn/a.png thanks"),
            "https://cdn/a.png"
        );
        assert_eq!(sanitize_url("`https://cdn/b.png`"), "https://cdn/b.png");
        assert_eq!(clean_url("  `abc def`  "), "abcdef");
    }

    #[test]
    fn test_sanitize_deep_touches_only_url_strings() {
        let body = json!({
            "prompt": "a cat  sitting",
            "image": " `https://cdn/in.png` ",
            "list": ["see https://cdn/x.png now", 3]
        });
        assert_eq!(
            sanitize_urls_deep(&body),
            json!({
                "prompt": "a cat  sitting",
                "image": "https://cdn/in.png",
                "list": ["https://cdn/x.png", 3]
            })
        );
    }
}
