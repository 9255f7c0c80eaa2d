//! Sub-configuration structs with their defaults.

use crate::adapter::AdapterConfig;
use crate::gateway::OutputType;
use crate::signing::SigningTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outbound request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL for envelopes that carry a relative path
    pub base_url: String,

    /// Deadline for a single request attempt
    pub request_timeout_ms: u64,

    /// Total attempts for the signed provider (other providers get one)
    pub signed_max_attempts: u32,

    /// Base delay after a 502/503/504, multiplied by the attempt number
    pub status_retry_delay_ms: u64,

    /// Base delay after a network failure, multiplied by the attempt number
    pub transport_retry_delay_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            request_timeout_ms: 60_000,
            signed_max_attempts: 3,
            status_retry_delay_ms: 800,
            transport_retry_delay_ms: 2000,
        }
    }
}

/// Asynchronous task polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Status checks before giving up
    pub max_attempts: u32,

    /// Wait before each status check
    pub interval_ms: u64,

    /// Additional status values treated as terminal failure
    pub extra_failure_tokens: Vec<String>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_ms: 1000,
            extra_failure_tokens: Vec::new(),
        }
    }
}

/// Query signing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Enabled tiers, tried in order
    pub tiers: Vec<SigningTier>,

    /// How long to wait on the background worker before abandoning it
    pub worker_timeout_ms: u64,

    /// Trusted signing endpoint for the `remote` tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<String>,

    /// Deadline for the remote signing call
    pub remote_timeout_ms: u64,

    /// Local proxy prefix stripped from the path before signing
    pub proxy_prefix: String,

    /// URL substrings identifying the signed provider
    pub url_markers: Vec<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            tiers: SigningTier::ALL.to_vec(),
            worker_timeout_ms: 30_000,
            remote_endpoint: None,
            remote_timeout_ms: 10_000,
            proxy_prefix: "/api/liblib".to_string(),
            url_markers: vec![
                "/api/liblib/".to_string(),
                "openapi.liblibai.cloud".to_string(),
            ],
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// One inference provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Display name
    pub name: String,

    /// Default endpoint for requests to this provider
    pub base_url: String,

    /// Credential, or `${ENV_VAR}` to read it from the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Models offered; the first is injected when a request names none
    pub models: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<OutputType>,

    /// Request shaping and async-job handling
    pub adapter: AdapterConfig,

    /// Per-model adapters replacing `adapter` for that model
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub model_overrides: BTreeMap<String, AdapterConfig>,
}
