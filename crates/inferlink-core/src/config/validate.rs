//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.gateway.signed_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.signed_max_attempts must be > 0".into(),
            ));
        }
        if url::Url::parse(&self.gateway.base_url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "gateway.base_url is not an absolute URL: {}",
                self.gateway.base_url
            )));
        }
        if self.polling.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "polling.max_attempts must be > 0".into(),
            ));
        }
        if self.signing.tiers.is_empty() {
            return Err(ConfigError::ValidationError(
                "signing.tiers must enable at least one tier".into(),
            ));
        }
        if self.signing.worker_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "signing.worker_timeout_ms must be > 0".into(),
            ));
        }
        for (id, provider) in &self.providers {
            let descriptors = provider
                .adapter
                .response_path
                .iter()
                .chain(provider.model_overrides.values().filter_map(|a| a.response_path.as_ref()));
            for descriptor in descriptors {
                if descriptor.task_id_path.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{id}: response_path.task_id must not be empty"
                    )));
                }
                if descriptor.status_endpoint.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{id}: response_path.status_endpoint must not be empty"
                    )));
                }
                if descriptor.max_attempts == Some(0) {
                    return Err(ConfigError::ValidationError(format!(
                        "providers.{id}: response_path.max_attempts must be > 0"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::PollingDescriptor;
    use crate::config::ProviderConfig;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.gateway.request_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_relative_base_url() {
        let mut config = Config::default();
        config.gateway.base_url = "/api".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_validate_rejects_empty_tiers() {
        let mut config = Config::default();
        config.signing.tiers.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing.tiers"));
    }

    #[test]
    fn test_validate_rejects_zero_poll_override() {
        let mut descriptor = PollingDescriptor::dashscope_task();
        descriptor.max_attempts = Some(0);
        let mut provider = ProviderConfig::default();
        provider.adapter.response_path = Some(descriptor);

        let mut config = Config::default();
        config.providers.insert("wanx".to_string(), provider);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("providers.wanx"));
    }
}
