//! Provider registry.
//!
//! Holds the configured providers together with their resolved credentials.
//! The registry is an immutable value: every update returns a new registry
//! and leaves the original untouched, so a snapshot can be shared across
//! in-flight requests while configuration changes.

use crate::adapter::AdapterConfig;
use crate::config::{Config, ProviderConfig};
use crate::credential::ProviderCredential;
use crate::error::ConfigError;
use crate::gateway::{HttpMethod, RequestEnvelope};
use crate::template::Params;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One registered provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEntry {
    pub id: String,
    pub config: ProviderConfig,
    pub credential: ProviderCredential,
}

impl ProviderEntry {
    /// Adapter in effect for `model`: its override if one exists, else the default.
    pub fn adapter_for(&self, model: Option<&str>) -> &AdapterConfig {
        model
            .and_then(|m| self.config.model_overrides.get(m))
            .unwrap_or(&self.config.adapter)
    }

    /// Model used when a request names none.
    pub fn default_model(&self) -> Option<&str> {
        self.config.models.first().map(String::as_str)
    }
}

/// Immutable set of providers keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<ProviderEntry>>,
}

impl ProviderRegistry {
    /// Build from the `[providers]` section, resolving `${ENV}` credentials.
    pub fn from_config(config: &Config) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|(id, provider)| {
                let credential = provider
                    .api_key
                    .as_deref()
                    .and_then(resolve_env_var)
                    .map(ProviderCredential::new)
                    .unwrap_or_default();
                if credential.is_empty() {
                    tracing::debug!(provider = %id, "No credential configured");
                }
                let entry = ProviderEntry {
                    id: id.clone(),
                    config: provider.clone(),
                    credential,
                };
                (id.clone(), Arc::new(entry))
            })
            .collect();
        Self { providers }
    }

    pub fn get(&self, id: &str) -> Result<&ProviderEntry, ConfigError> {
        self.providers
            .get(id)
            .map(Arc::as_ref)
            .ok_or_else(|| ConfigError::UnknownProvider(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderEntry> {
        self.providers.values().map(Arc::as_ref)
    }

    /// New registry with `id` added or replaced.
    pub fn with_provider(
        &self,
        id: impl Into<String>,
        config: ProviderConfig,
        credential: ProviderCredential,
    ) -> Self {
        let id = id.into();
        let mut providers = self.providers.clone();
        providers.insert(
            id.clone(),
            Arc::new(ProviderEntry {
                id,
                config,
                credential,
            }),
        );
        Self { providers }
    }

    /// New registry without `id`.
    pub fn without_provider(&self, id: &str) -> Self {
        let mut providers = self.providers.clone();
        providers.remove(id);
        Self { providers }
    }

    /// New registry with the credential of `id` replaced.
    pub fn with_credential(
        &self,
        id: &str,
        credential: ProviderCredential,
    ) -> Result<Self, ConfigError> {
        let entry = self.get(id)?;
        Ok(self.with_provider(id, entry.config.clone(), credential))
    }

    /// Build the request envelope for calling `id` with `params`.
    ///
    /// `params` becomes the body, or the template bag when the provider has a
    /// structure template. A missing `model` is filled from the provider's
    /// first listed model, and that model's override adapter is selected.
    pub fn envelope(&self, id: &str, mut params: Params) -> Result<RequestEnvelope, ConfigError> {
        let entry = self.get(id)?;

        let requested = params
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);
        let model = match requested {
            Some(model) => Some(model),
            None => {
                let fallback = entry.default_model().map(str::to_string);
                if let Some(m) = &fallback {
                    params.insert("model".to_string(), Value::String(m.clone()));
                }
                fallback
            }
        };

        let adapter = entry.adapter_for(model.as_deref()).clone();
        let url = adapter
            .routing
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| entry.config.base_url.clone());
        if url.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "providers.{id}: no base_url or routing.endpoint configured"
            )));
        }

        let mut envelope = RequestEnvelope::new(HttpMethod::Post, url)
            .with_body(Value::Object(params))
            .with_adapter(Arc::new(adapter));
        if let Some(output_type) = entry.config.output_type {
            envelope = envelope.with_output_type(output_type);
        }
        Ok(envelope)
    }
}

/// Resolve a config value that may reference environment variables.
///
/// A value of exactly `${VAR}` is read from the environment (`None` if
/// unset). Other values have inline `$VAR`/`${VAR}` references expanded
/// where possible and are otherwise returned as written.
pub fn resolve_env_var(value: &str) -> Option<String> {
    let value = value.trim();
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(
            shellexpand::env(value)
                .map(|expanded| expanded.into_owned())
                .unwrap_or_else(|_| value.to_string()),
        )
    }
}
