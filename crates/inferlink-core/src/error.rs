//! Error types for the inferlink gateway.
//!
//! Errors are organized by where a call chain can fail: configuration
//! (before any I/O), transport, the provider's HTTP or logical envelope,
//! query signing, and asynchronous task polling.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration or credential problems, raised before any network call
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network failure or per-attempt deadline exceeded
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Provider answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 2xx envelope carrying a non-zero internal code
    #[error("{message} (code: {code})")]
    VendorLogical { code: i64, message: String },

    /// Known transient failure hidden inside a response body
    #[error("{0}")]
    EmbeddedTransient(String),

    /// Polling reached a terminal failure status
    #[error("Task Failed: {reason}")]
    TaskFailure { reason: String },

    /// Polling exhausted its attempt ceiling
    #[error("Async Task Timeout after {attempts} status checks")]
    TaskTimeout { attempts: u32 },

    /// No signing tier could produce a signature
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Request URL could not be built
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Build a transport error from anything displayable.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// A credential part required by the provider is missing
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// No provider registered under this id
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// A referenced file does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Convenience type alias for gateway results.
pub type Result<T> = std::result::Result<T, GatewayError>;
