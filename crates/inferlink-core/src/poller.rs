//! Asynchronous task polling.
//!
//! Many providers answer a generation request with a task id and expect the
//! client to check a status endpoint until the job settles. [`poll`] drives
//! that loop from a [`PollingDescriptor`] and returns a normalized result:
//!
//! ```json
//! { "assets": [{ "url": "https://..." }], ...last status response }
//! ```
//!
//! Without a success sentinel the loop ends as soon as the result path
//! yields something non-empty ("presence mode").

use crate::adapter::PollingDescriptor;
use crate::credential::ProviderCredential;
use crate::error::{GatewayError, Result};
use crate::gateway::{Gateway, RequestEnvelope};
use crate::template;
use crate::{extract, path};
use regex::{NoExpand, Regex};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Status values that end polling as a failure.
pub const FAILURE_TOKENS: [&str; 11] = [
    "FAILED",
    "FAIL",
    "Failed",
    "failed",
    "Error",
    "error",
    "canceled",
    "cancelled",
    "Task not found",
    "Request Moderated",
    "Content Moderated",
];

const UNKNOWN_FAILURE: &str = "Unknown error";

static TASK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*task_id\s*\}\}").expect("task id pattern is valid"));

/// A zero-valued cache-buster copied from a template.
static STALE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([?&])timestamp=0(&|$)").expect("timestamp pattern is valid")
});

/// Poll until the task described by `descriptor` settles.
///
/// Returns `initial` unchanged when it carries no task id.
pub(crate) async fn poll(
    gateway: &Gateway,
    initial: Value,
    descriptor: &PollingDescriptor,
    origin: &Url,
    credential: &ProviderCredential,
) -> Result<Value> {
    let Some(task_id) = path::resolve(&initial, &descriptor.task_id_path).map(template::text_form)
    else {
        tracing::debug!(
            task_id_path = %descriptor.task_id_path,
            "No task id in response, returning it as the final result"
        );
        return Ok(initial);
    };

    let defaults = gateway.polling_config();
    let max_attempts = descriptor.max_attempts.unwrap_or(defaults.max_attempts);
    let interval = Duration::from_millis(descriptor.interval_ms.unwrap_or(defaults.interval_ms));
    let failure_tokens: Vec<&str> = FAILURE_TOKENS
        .iter()
        .copied()
        .chain(defaults.extra_failure_tokens.iter().map(String::as_str))
        .collect();

    tracing::info!(%task_id, max_attempts, "Task submitted, polling for completion");

    for attempt in 1..=max_attempts {
        tokio::time::sleep(interval).await;

        let url = status_url(descriptor, &task_id, origin)?;
        let mut envelope = RequestEnvelope::new(descriptor.method, url);
        if let Some(body) = &descriptor.body_template {
            envelope = envelope.with_body(fill_task_id(body, &task_id));
        }
        let (response, _) = gateway.exchange(&envelope, credential).await?;
        let data = response.into_json().unwrap_or(Value::Null);

        let status = descriptor
            .status_path
            .as_deref()
            .and_then(|p| path::resolve(&data, p));

        match descriptor.sentinel() {
            Some(sentinel) => {
                if status.is_some_and(|s| status_matches(s, sentinel)) {
                    tracing::info!(%task_id, attempt, "Task succeeded");
                    let result = descriptor.result_path.locate(&data);
                    return Ok(normalize(result.as_ref(), data));
                }
                if let Some(s) = status.filter(|s| is_failure(s, &failure_tokens)) {
                    let reason = path::resolve(&data, descriptor.fail_path())
                        .map(template::text_form)
                        .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
                    tracing::warn!(%task_id, status = %template::text_form(s), "Task failed: {reason}");
                    return Err(GatewayError::TaskFailure { reason });
                }
            }
            None => {
                let result = descriptor.result_path.locate(&data);
                if result.as_ref().is_some_and(has_content) {
                    tracing::info!(%task_id, attempt, "Task result available");
                    return Ok(normalize(result.as_ref(), data));
                }
            }
        }

        tracing::debug!(
            %task_id,
            attempt,
            status = status.map(template::text_form).unwrap_or_default(),
            "Task still running"
        );
    }

    Err(GatewayError::TaskTimeout {
        attempts: max_attempts,
    })
}

/// Build the absolute status URL for one check.
fn status_url(descriptor: &PollingDescriptor, task_id: &str, origin: &Url) -> Result<String> {
    let rendered = TASK_ID.replace_all(&descriptor.status_endpoint, NoExpand(task_id));
    let now = chrono::Utc::now().timestamp_millis();
    let refreshed = STALE_TIMESTAMP
        .replace_all(&rendered, |caps: &regex::Captures| {
            format!("{}timestamp={now}{}", &caps[1], &caps[2])
        })
        .into_owned();

    match Url::parse(&refreshed) {
        Ok(url) => Ok(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(&origin.origin().ascii_serialization())?;
            Ok(base.join(&refreshed)?.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Substitute `{{task_id}}` in every string of a status body template.
/// Other text, including unrelated placeholders, is left as written.
fn fill_task_id(template: &Value, task_id: &str) -> Value {
    match template {
        Value::String(s) => Value::String(TASK_ID.replace_all(s, NoExpand(task_id)).into_owned()),
        Value::Array(items) => Value::Array(items.iter().map(|v| fill_task_id(v, task_id)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), fill_task_id(v, task_id)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Sentinel comparison: JSON equality, or equal text for scalars.
fn status_matches(status: &Value, sentinel: &Value) -> bool {
    status == sentinel
        || (is_scalar(status) && is_scalar(sentinel) && template::text_form(status) == template::text_form(sentinel))
}

fn is_failure(status: &Value, tokens: &[&str]) -> bool {
    is_scalar(status) && {
        let text = template::text_form(status);
        tokens.iter().any(|t| *t == text)
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Presence-mode completion check.
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        other => !template::text_form(other).trim().is_empty(),
    }
}

/// Wrap the located result as `{assets: [{url}], ...data}`.
fn normalize(result: Option<&Value>, data: Value) -> Value {
    let assets: Vec<Value> = match result {
        Some(Value::Array(items)) => items.iter().filter_map(asset_url).collect(),
        Some(single) => asset_url(single).into_iter().collect(),
        None => Vec::new(),
    }
    .into_iter()
    .map(|url| json!({ "url": url }))
    .collect();

    let mut out = Map::new();
    out.insert("assets".to_string(), Value::Array(assets));
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                if key != "assets" {
                    out.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            out.insert("response".to_string(), other);
        }
    }
    Value::Object(out)
}

/// URL of one result item: `imageUrl`, then `url`, then the item itself.
fn asset_url(item: &Value) -> Option<String> {
    let raw = match item {
        Value::Object(map) => ["imageUrl", "url"]
            .iter()
            .find_map(|k| map.get(*k).filter(|v| path::is_present(v)))
            .map(template::text_form)?,
        Value::Null => return None,
        other => template::text_form(other),
    };
    let url = extract::sanitize_url(&raw);
    (!url.is_empty()).then_some(url)
}
