//! Provider credentials.
//!
//! A credential is an opaque string. Bearer-style providers use it as-is;
//! the query-signed provider packs an access key and a secret key into it,
//! one per line.

use crate::error::ConfigError;
use std::fmt;

/// Opaque provider credential. `Debug` never prints the secret.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredential(String);

impl ProviderCredential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The trimmed raw value.
    pub fn expose(&self) -> &str {
        self.0.trim()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// `Authorization` header value, if the credential is non-empty.
    ///
    /// Keys already carrying a `Bearer ` prefix are sent verbatim.
    pub fn bearer(&self) -> Option<String> {
        let key = self.expose();
        if key.is_empty() {
            return None;
        }
        let has_prefix = key
            .get(..7)
            .is_some_and(|p| p.eq_ignore_ascii_case("bearer "));
        Some(if has_prefix {
            key.to_string()
        } else {
            format!("Bearer {key}")
        })
    }

    /// Split into `(access_key, secret_key)` for query signing.
    ///
    /// Parts may be separated by newlines, `|`, `,` or `;`.
    pub fn signed_pair(&self) -> Result<(&str, &str), ConfigError> {
        let mut parts = self
            .expose()
            .split(['\n', '\r', '|', ',', ';'])
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let access_key = parts.next().ok_or_else(|| {
            ConfigError::MissingCredential(
                "AccessKey is empty; put the access key on the first line".into(),
            )
        })?;
        let secret_key = parts.next().ok_or_else(|| {
            ConfigError::MissingCredential(
                "SecretKey is empty; put the secret key on the second line".into(),
            )
        })?;
        Ok((access_key, secret_key))
    }
}

impl fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ProviderCredential(<empty>)")
        } else {
            f.write_str("ProviderCredential(<redacted>)")
        }
    }
}

impl From<&str> for ProviderCredential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderCredential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_prefix_added() {
        let cred = ProviderCredential::new("  sk-123 ");
        assert_eq!(cred.bearer().as_deref(), Some("Bearer sk-123"));
    }

    #[test]
    fn test_bearer_prefix_kept() {
        let cred = ProviderCredential::new("bearer sk-123");
        assert_eq!(cred.bearer().as_deref(), Some("bearer sk-123"));
    }

    #[test]
    fn test_empty_has_no_bearer() {
        assert_eq!(ProviderCredential::new("   ").bearer(), None);
    }

    #[test]
    fn test_signed_pair_newline() {
        let cred = ProviderCredential::new("access\nsecret\n");
        assert_eq!(cred.signed_pair().unwrap(), ("access", "secret"));
    }

    #[test]
    fn test_signed_pair_other_separators() {
        let cred = ProviderCredential::new("access | secret");
        assert_eq!(cred.signed_pair().unwrap(), ("access", "secret"));
    }

    #[test]
    fn test_signed_pair_missing_secret() {
        let err = ProviderCredential::new("access-only").signed_pair().unwrap_err();
        assert!(err.to_string().contains("SecretKey"));
    }

    #[test]
    fn test_signed_pair_missing_access() {
        let err = ProviderCredential::new("").signed_pair().unwrap_err();
        assert!(err.to_string().contains("AccessKey"));
    }

    #[test]
    fn test_debug_redacts() {
        let cred = ProviderCredential::new("super-secret");
        assert!(!format!("{cred:?}").contains("super-secret"));
    }
}
