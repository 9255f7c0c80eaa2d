//! Structure templates with `{{placeholder}}` substitution.
//!
//! Walks a JSON skeleton depth-first and resolves every string leaf against a
//! flat parameter bag. A leaf that is exactly one placeholder takes the raw
//! bag value (keeping its JSON type); a leaf that mixes text and placeholders
//! is interpolated textually. Key order is preserved.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Flat named-value bag used to fill templates.
pub type Params = Map<String, Value>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("placeholder pattern is valid"));

/// Render a template against `params`.
///
/// A top-level template that is a single unresolved placeholder renders as
/// `null`; nested ones are dropped from their parent object or array. Object
/// members that resolve to `null` are omitted as well.
pub fn render(template: &Value, params: &Params) -> Value {
    resolve(template, params).unwrap_or(Value::Null)
}

/// Resolve a template node, returning `None` when the node is absent.
pub fn resolve(template: &Value, params: &Params) -> Option<Value> {
    match template {
        Value::String(s) => resolve_str(s, params),
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|v| resolve(v, params)).collect(),
        )),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                match resolve(v, params) {
                    None | Some(Value::Null) => {}
                    Some(resolved) => {
                        out.insert(key.clone(), resolved);
                    }
                }
            }
            Some(Value::Object(out))
        }
        other => Some(other.clone()),
    }
}

fn resolve_str(s: &str, params: &Params) -> Option<Value> {
    if let Some(name) = sole_placeholder(s) {
        return params.get(name).cloned();
    }
    if !s.contains("{{") {
        return Some(Value::String(s.to_string()));
    }
    let replaced = PLACEHOLDER.replace_all(s, |caps: &regex::Captures<'_>| {
        params
            .get(caps[1].trim())
            .map(text_form)
            .unwrap_or_default()
    });
    Some(Value::String(replaced.into_owned()))
}

/// Name inside a leaf that is exactly one placeholder, if it is one.
fn sole_placeholder(s: &str) -> Option<&str> {
    let inner = s.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

/// String form of a value for textual interpolation.
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_sole_placeholder_keeps_number_type() {
        let out = render(&json!("{{x}}"), &bag(json!({"x": 42})));
        assert_eq!(out, json!(42));
    }

    #[test]
    fn test_mixed_placeholder_interpolates_text() {
        let out = render(&json!("id-{{x}}"), &bag(json!({"x": 42})));
        assert_eq!(out, json!("id-42"));
    }

    #[test]
    fn test_surrounding_whitespace_still_sole_placeholder() {
        let out = render(&json!("  {{ flag }} "), &bag(json!({"flag": true})));
        assert_eq!(out, json!(true));
    }

    #[test]
    fn test_sole_placeholder_keeps_nested_structure() {
        let params = bag(json!({"net": [{"modelId": "abc", "weight": 0.8}]}));
        let out = render(&json!({"additionalNetwork": "{{net}}"}), &params);
        assert_eq!(out, json!({"additionalNetwork": [{"modelId": "abc", "weight": 0.8}]}));
    }

    #[test]
    fn test_unresolved_text_placeholder_becomes_empty() {
        let out = render(&json!("a-{{missing}}-b"), &Params::new());
        assert_eq!(out, json!("a--b"));
    }

    #[test]
    fn test_unresolved_sole_placeholder_is_dropped() {
        let template = json!({"prompt": "{{prompt}}", "image": "{{image}}", "list": ["{{image}}", 1]});
        let out = render(&template, &bag(json!({"prompt": "cat"})));
        assert_eq!(out, json!({"prompt": "cat", "list": [1]}));
    }

    #[test]
    fn test_null_members_are_omitted() {
        let template = json!({"prompt": "{{prompt}}", "seed": "{{seed}}", "fixed": null});
        let out = render(&template, &bag(json!({"prompt": "x", "seed": null})));
        assert_eq!(out, json!({"prompt": "x"}));
    }

    #[test]
    fn test_null_array_items_are_kept() {
        let out = render(&json!(["{{seed}}", null]), &bag(json!({"seed": null})));
        assert_eq!(out, json!([null, null]));
    }

    #[test]
    fn test_multiple_placeholders_in_one_leaf() {
        let params = bag(json!({"w": 1024, "h": 768}));
        assert_eq!(render(&json!("{{w}}x{{h}}"), &params), json!("1024x768"));
    }

    #[test]
    fn test_identity_without_placeholders() {
        let template = json!({"model": "fixed", "n": 1, "nested": {"a": [true, false]}});
        assert_eq!(render(&template, &bag(json!({"model": "other"}))), template);
    }

    #[test]
    fn test_deterministic() {
        let template = json!({"model": "{{model}}", "size": "{{w}}*{{h}}"});
        let params = bag(json!({"model": "m1", "w": 1, "h": 2}));
        assert_eq!(render(&template, &params), render(&template, &params));
    }

    #[test]
    fn test_key_order_preserved() {
        let template = json!({"z": "{{a}}", "a": "{{z}}", "m": 0});
        let out = render(&template, &bag(json!({"a": 1, "z": 2})));
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }
}
