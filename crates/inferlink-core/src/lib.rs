//! Inferlink Core - provider-neutral gateway for inference APIs.
//!
//! Inferlink turns one declarative request envelope into a call against any
//! of a set of third-party generation providers, hiding their differences in
//! authentication, body shape and job lifecycle.
//!
//! # Architecture
//!
//! ```text
//! params → Registry → Template → Sign? → Transport (retry) → Interpret → Poll? → result
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use inferlink_core::{Config, Inferlink};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> inferlink_core::Result<()> {
//!     let inferlink = Inferlink::new(Config::load()?);
//!     let params = json!({"prompt": "a lighthouse at dusk"});
//!     let result = inferlink.send("wanx", params.as_object().cloned().unwrap_or_default()).await?;
//!     println!("{}", result.to_json());
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod adapter;
pub mod config;
pub mod credential;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod path;
pub mod poller;
pub mod registry;
pub mod signing;
pub mod template;

// Re-exports for convenient access
pub use adapter::{AdapterConfig, PollingDescriptor, Routing};
pub use config::Config;
pub use credential::ProviderCredential;
pub use error::{ConfigError, GatewayError, Result};
pub use gateway::{Gateway, GatewayResponse, HttpMethod, OutputType, RequestEnvelope};
pub use path::ResultLocator;
pub use registry::{ProviderEntry, ProviderRegistry};
pub use signing::{SignatureEngine, SigningTier};
pub use template::Params;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configured gateway plus provider registry - the main entry point.
pub struct Inferlink {
    config: Config,
    registry: ProviderRegistry,
    gateway: Gateway,
}

impl Inferlink {
    /// Create an instance over a real HTTP client.
    pub fn new(config: Config) -> Self {
        let gateway = Gateway::new(&config);
        Self::with_gateway(config, gateway)
    }

    /// Create an instance over a caller-supplied gateway.
    pub fn with_gateway(config: Config, gateway: Gateway) -> Self {
        tracing::debug!("Initializing inferlink v{}", VERSION);
        let registry = ProviderRegistry::from_config(&config);
        Self {
            config,
            registry,
            gateway,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Replace the registry snapshot used for subsequent calls.
    pub fn set_registry(&mut self, registry: ProviderRegistry) {
        self.registry = registry;
    }

    /// Call provider `id` with a flat parameter bag.
    pub async fn send(&self, id: &str, params: Params) -> Result<GatewayResponse> {
        let envelope = self.registry.envelope(id, params)?;
        let credential = &self.registry.get(id)?.credential;
        tracing::info!(provider = id, url = %envelope.url, "Dispatching request");
        self.gateway.send(envelope, credential).await
    }
}
