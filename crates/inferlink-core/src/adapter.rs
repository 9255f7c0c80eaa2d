//! Declarative provider adapters.
//!
//! An [`AdapterConfig`] says how to map the provider-neutral parameter bag
//! onto one vendor's request shape, and a [`PollingDescriptor`] says how to
//! turn that vendor's submit-then-poll job API into a single awaited result.
//! Both are loaded once from configuration and never mutated.

use crate::gateway::HttpMethod;
use crate::path::ResultLocator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How to shape requests for one provider (or one model of a provider).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Request body skeleton with `{{name}}` placeholders.
    /// When present it fully replaces the caller's body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_template: Option<Value>,

    /// Endpoint routing
    pub routing: Routing,

    /// Asynchronous job handling, if the provider answers with a task id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_path: Option<PollingDescriptor>,

    /// Extra request headers (e.g. `X-DashScope-Async = "enable"`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Endpoint routing for an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routing {
    /// Fixed endpoint; overrides the envelope URL when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Converts a vendor's asynchronous job API into poll-until-done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingDescriptor {
    /// Path (with `|` alternatives) to the task id in the submit response
    #[serde(rename = "task_id")]
    pub task_id_path: String,

    /// Status URL; `{{task_id}}` is substituted, relative URLs use the submit origin
    pub status_endpoint: String,

    /// HTTP method for status checks
    #[serde(default = "default_poll_method")]
    pub method: HttpMethod,

    /// Status request body; `{{task_id}}` is substituted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<Value>,

    /// Path to the job status in the status response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_path: Option<String>,

    /// Status token meaning "done". Without one, a present result is the signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_value: Option<Value>,

    /// Path to the failure reason; defaults to `failReason`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_path: Option<String>,

    /// Where the final result lives
    pub result_path: ResultLocator,

    /// Overrides `polling.max_attempts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Overrides `polling.interval_ms`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

fn default_poll_method() -> HttpMethod {
    HttpMethod::Get
}

/// Default failure-reason path when none is configured.
pub const DEFAULT_FAIL_PATH: &str = "failReason";

impl PollingDescriptor {
    /// Descriptor with required fields set and everything else defaulted.
    pub fn new(
        task_id_path: impl Into<String>,
        status_endpoint: impl Into<String>,
        result_path: ResultLocator,
    ) -> Self {
        Self {
            task_id_path: task_id_path.into(),
            status_endpoint: status_endpoint.into(),
            method: HttpMethod::Get,
            body_template: None,
            status_path: None,
            success_value: None,
            fail_path: None,
            result_path,
            max_attempts: None,
            interval_ms: None,
        }
    }

    /// Sentinel value, if one is configured and non-empty.
    pub fn sentinel(&self) -> Option<&Value> {
        self.success_value
            .as_ref()
            .filter(|v| crate::path::is_present(v))
    }

    pub fn fail_path(&self) -> &str {
        self.fail_path.as_deref().unwrap_or(DEFAULT_FAIL_PATH)
    }

    /// DashScope async task API (`X-DashScope-Async: enable` submissions).
    pub fn dashscope_task() -> Self {
        Self {
            status_path: Some("output.task_status".to_string()),
            success_value: Some(Value::String("SUCCEEDED".to_string())),
            fail_path: Some("output.message".to_string()),
            ..Self::new(
                "output.task_id",
                "/api/dashscope/api/v1/tasks/{{task_id}}",
                ResultLocator::ExactPath("output.results".to_string()),
            )
        }
    }

    /// Midjourney-style `submit/imagine` + `task/{id}/fetch` API.
    pub fn midjourney_fetch(base_url: &str) -> Self {
        Self {
            status_path: Some("status".to_string()),
            success_value: Some(Value::String("SUCCESS".to_string())),
            ..Self::new(
                "result",
                format!("{}/mj/task/{{{{task_id}}}}/fetch", base_url.trim_end_matches('/')),
                ResultLocator::ExactPath("imageUrl".to_string()),
            )
        }
    }
}
