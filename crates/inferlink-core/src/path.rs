//! Dotted-path lookups into arbitrary JSON response trees.
//!
//! A path expression is one or more dotted paths joined by `|`. Each
//! alternative is tried left-to-right and the first *present* value wins:
//! non-null, and for strings non-empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token that selects the latest-asset heuristic instead of a fixed path.
pub const LATEST_ASSET_TOKEN: &str = "$AUTO_IMAGE_URL";

/// Resolve `expr` against `root`.
pub fn resolve<'a>(root: &'a Value, expr: &str) -> Option<&'a Value> {
    alternatives(expr).find_map(|path| walk(root, path))
}

fn alternatives(expr: &str) -> impl Iterator<Item = &str> {
    expr.split('|').map(str::trim).filter(|s| !s.is_empty())
}

fn walk<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.split('.') {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    is_present(node).then_some(node)
}

/// A value counts as present when it is non-null and not an empty string.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// How the final result is located in a completed status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResultLocator {
    /// A single dotted path
    ExactPath(String),
    /// Several dotted paths tried in order
    Alternatives(Vec<String>),
    /// Newest asset URLs found anywhere in the tree
    LatestTimestampedAsset,
}

impl ResultLocator {
    /// Parse the configured string form.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();
        if expr == LATEST_ASSET_TOKEN {
            return Self::LatestTimestampedAsset;
        }
        let paths: Vec<String> = alternatives(expr).map(String::from).collect();
        if paths.len() > 1 {
            Self::Alternatives(paths)
        } else {
            Self::ExactPath(expr.to_string())
        }
    }

    /// Locate the result in `root`.
    ///
    /// The heuristic returns an array of URL strings (possibly empty).
    pub fn locate(&self, root: &Value) -> Option<Value> {
        match self {
            Self::ExactPath(path) => walk(root, path).cloned(),
            Self::Alternatives(paths) => paths.iter().find_map(|p| walk(root, p)).cloned(),
            Self::LatestTimestampedAsset => Some(Value::Array(
                crate::extract::extract_latest_assets(root)
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            )),
        }
    }
}

impl From<String> for ResultLocator {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ResultLocator> for String {
    fn from(value: ResultLocator) -> Self {
        match value {
            ResultLocator::ExactPath(path) => path,
            ResultLocator::Alternatives(paths) => paths.join("|"),
            ResultLocator::LatestTimestampedAsset => LATEST_ASSET_TOKEN.to_string(),
        }
    }
}
