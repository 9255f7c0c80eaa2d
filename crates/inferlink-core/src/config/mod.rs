//! Configuration management for inferlink.
//!
//! Configuration is loaded from a TOML file with defaults for every field.
//! Providers live under `[providers.<id>]`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound request settings
    pub gateway: GatewayConfig,

    /// Async task polling settings
    pub polling: PollingConfig,

    /// Query signing settings
    pub signing: SigningConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Providers keyed by id
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.inferlink.inferlink/config.toml
    /// - Linux: ~/.config/inferlink/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\inferlink\config\config.toml
    ///
    /// Falls back to ~/.inferlink/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "inferlink", "inferlink")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".inferlink").join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SigningTier;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.polling.max_attempts, 60);
        assert_eq!(config.polling.interval_ms, 1000);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[gateway]"));
        assert!(toml.contains("[signing]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [signing]
            tiers = ["software", "remote"]
            remote_endpoint = "https://signer.internal/sign"

            [providers.mj]
            name = "Midjourney"
            base_url = "https://api.n1n.ai/mj/submit/imagine"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.signing.tiers,
            vec![SigningTier::Software, SigningTier::Remote]
        );
        assert_eq!(config.signing.proxy_prefix, "/api/liblib");
        assert_eq!(config.gateway.signed_max_attempts, 3);
        assert_eq!(config.providers["mj"].name, "Midjourney");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\nmax_attempts = 5").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.polling.max_attempts, 5);
    }

    #[test]
    fn test_load_from_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[polling]\nmax_attempts = 0").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unknown_tier_is_parse_error() {
        let err = Config::from_toml("[signing]\ntiers = [\"quantum\"]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
