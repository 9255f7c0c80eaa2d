//! Query-string HMAC signing.
//!
//! The signed provider authenticates through four query parameters instead
//! of a header. The signature is HMAC-SHA1 over `{uri}&{timestamp}&{nonce}`,
//! encoded as base64url without padding.
//!
//! Computation runs through a cascade of tiers, each tried only when the one
//! before it is disabled, fails locally, or times out:
//!
//! 1. `platform`: RustCrypto `hmac` + `sha1`
//! 2. `worker`: the same computation on a long-lived background thread
//! 3. `software`: self-contained SHA-1/HMAC in [`software`]
//! 4. `remote`: a trusted signing endpoint

pub mod software;

mod remote;
mod worker;

use crate::config::SigningConfig;
use crate::credential::ProviderCredential;
use crate::error::{GatewayError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use url::Url;
use worker::HmacWorker;

/// Query parameter names written by [`SignatureEngine::sign_url`].
pub const ACCESS_KEY_PARAM: &str = "AccessKey";
pub const SIGNATURE_PARAM: &str = "Signature";
pub const TIMESTAMP_PARAM: &str = "Timestamp";
pub const NONCE_PARAM: &str = "SignatureNonce";

const SIGNED_PARAMS: [&str; 4] = [ACCESS_KEY_PARAM, SIGNATURE_PARAM, TIMESTAMP_PARAM, NONCE_PARAM];

/// A signature computation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningTier {
    Platform,
    Worker,
    Software,
    Remote,
}

impl SigningTier {
    pub const ALL: [SigningTier; 4] = [
        SigningTier::Platform,
        SigningTier::Worker,
        SigningTier::Software,
        SigningTier::Remote,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SigningTier::Platform => "platform",
            SigningTier::Worker => "worker",
            SigningTier::Software => "software",
            SigningTier::Remote => "remote",
        }
    }
}

impl fmt::Display for SigningTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of asking one tier for a signature.
enum TierOutcome {
    Signed(String),
    Unavailable(String),
}

/// HMAC-SHA1 via RustCrypto, base64url without padding.
pub(crate) fn platform_signature(secret: &str, message: &str) -> String {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC takes keys of any size"));
    mac.update(message.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// HMAC-SHA1 via the self-contained implementation, base64url without padding.
pub fn software_signature(secret: &str, message: &str) -> String {
    URL_SAFE_NO_PAD.encode(software::hmac_sha1(secret.as_bytes(), message.as_bytes()))
}

/// Canonical string the signature covers.
///
/// `proxy_prefix` is stripped from the path so the signature matches what the
/// provider sees behind a local reverse proxy.
pub fn canonical_message(path: &str, proxy_prefix: &str, timestamp: &str, nonce: &str) -> String {
    let uri = match path.strip_prefix(proxy_prefix) {
        Some(rest) if !proxy_prefix.is_empty() => {
            if rest.is_empty() {
                "/"
            } else {
                rest
            }
        }
        _ if path.is_empty() => "/",
        _ => path,
    };
    format!("{uri}&{timestamp}&{nonce}")
}

/// Signature engine owning the cascade and the background worker.
pub struct SignatureEngine {
    config: SigningConfig,
    worker: Mutex<Option<HmacWorker>>,
    client: reqwest::Client,
}

impl SignatureEngine {
    pub fn new(config: SigningConfig) -> Self {
        Self {
            config,
            worker: Mutex::new(None),
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Whether `url` targets the query-signed provider.
    pub fn requires_signing(&self, url: &str) -> bool {
        self.config
            .url_markers
            .iter()
            .any(|marker| !marker.is_empty() && url.contains(marker.as_str()))
    }

    /// Sign `message` with `secret`, walking the configured tiers in order.
    pub async fn sign(&self, secret: &str, message: &str) -> Result<String> {
        let mut skipped = Vec::new();
        for &tier in &self.config.tiers {
            match self.sign_on(tier, secret, message).await? {
                TierOutcome::Signed(signature) => {
                    tracing::debug!(%tier, "Signature computed");
                    return Ok(signature);
                }
                TierOutcome::Unavailable(reason) => {
                    tracing::warn!(%tier, "Signing tier unavailable, falling through: {reason}");
                    skipped.push(format!("{tier}: {reason}"));
                }
            }
        }
        Err(GatewayError::Signing(format!(
            "no signing tier produced a signature [{}]",
            skipped.join("; ")
        )))
    }

    /// Sign with one specific tier, ignoring the configured cascade.
    pub async fn sign_with(&self, tier: SigningTier, secret: &str, message: &str) -> Result<String> {
        match self.sign_on(tier, secret, message).await? {
            TierOutcome::Signed(signature) => Ok(signature),
            TierOutcome::Unavailable(reason) => {
                Err(GatewayError::Signing(format!("{tier} tier unavailable: {reason}")))
            }
        }
    }

    async fn sign_on(&self, tier: SigningTier, secret: &str, message: &str) -> Result<TierOutcome> {
        let outcome = match tier {
            SigningTier::Platform => TierOutcome::Signed(platform_signature(secret, message)),
            SigningTier::Worker => self.sign_in_worker(secret, message).await,
            SigningTier::Software => TierOutcome::Signed(software_signature(secret, message)),
            SigningTier::Remote => match self.config.remote_endpoint.as_deref() {
                Some(endpoint) if !endpoint.trim().is_empty() => TierOutcome::Signed(
                    remote::sign_remote(
                        &self.client,
                        endpoint,
                        Duration::from_millis(self.config.remote_timeout_ms),
                        secret,
                        message,
                    )
                    .await?,
                ),
                _ => TierOutcome::Unavailable("no remote endpoint configured".to_string()),
            },
        };
        Ok(outcome)
    }

    async fn sign_in_worker(&self, secret: &str, message: &str) -> TierOutcome {
        let pending = {
            let mut slot = self.worker_slot();
            if slot.is_none() {
                match HmacWorker::spawn() {
                    Ok(worker) => {
                        tracing::debug!("Spawned HMAC worker");
                        *slot = Some(worker);
                    }
                    Err(e) => return TierOutcome::Unavailable(format!("worker spawn failed: {e}")),
                }
            }
            match slot.as_ref().and_then(|w| w.submit(secret, message)) {
                Some(rx) => rx,
                None => {
                    slot.take();
                    return TierOutcome::Unavailable("worker is not accepting jobs".to_string());
                }
            }
        };

        let timeout = Duration::from_millis(self.config.worker_timeout_ms);
        match tokio::time::timeout(timeout, pending).await {
            Ok(Ok(signature)) => TierOutcome::Signed(signature),
            Ok(Err(_)) => {
                self.worker_slot().take();
                TierOutcome::Unavailable("worker exited before answering".to_string())
            }
            Err(_) => {
                // Abandon the stuck worker; the next call spawns a fresh one
                self.worker_slot().take();
                TierOutcome::Unavailable(format!(
                    "worker timed out after {}ms",
                    self.config.worker_timeout_ms
                ))
            }
        }
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<HmacWorker>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether the background worker is currently running.
    pub fn worker_running(&self) -> bool {
        self.worker_slot().is_some()
    }

    /// Stop the background worker, if any, and wait for it to exit.
    pub fn shutdown(&self) {
        let worker = self.worker_slot().take();
        if let Some(worker) = worker {
            worker.join();
            tracing::debug!("HMAC worker shut down");
        }
    }

    /// Append the four signature query parameters to `url`.
    ///
    /// Fails with a configuration error before any network call when either
    /// part of the credential is missing.
    pub async fn sign_url(&self, url: &Url, credential: &ProviderCredential) -> Result<Url> {
        let (access_key, secret_key) = credential.signed_pair()?;
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        let message = canonical_message(url.path(), &self.config.proxy_prefix, &timestamp, &nonce);
        let signature = self.sign(secret_key, &message).await?;
        Ok(with_signature_params(
            url,
            access_key,
            &signature,
            &timestamp,
            &nonce,
        ))
    }
}

impl Drop for SignatureEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn with_signature_params(
    url: &Url,
    access_key: &str,
    signature: &str,
    timestamp: &str,
    nonce: &str,
) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !SIGNED_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut signed = url.clone();
    signed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(ACCESS_KEY_PARAM, access_key)
        .append_pair(SIGNATURE_PARAM, signature)
        .append_pair(TIMESTAMP_PARAM, timestamp)
        .append_pair(NONCE_PARAM, nonce);
    signed
}
