//! The `inferlink sign` command.
//!
//! Computes the query signature the signed provider expects, using either the
//! configured cascade or one forced tier. Useful for checking a signing setup
//! against the provider's own examples.

use anyhow::Context;
use clap::Args;
use inferlink_core::{Config, ProviderCredential, SignatureEngine, SigningTier};

/// Arguments for the `sign` command.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Canonical message, e.g. `/api/generate/webui/status&<ms>&<nonce>`
    #[arg(long)]
    pub message: String,

    /// Secret key
    #[arg(long, env = "INFERLINK_SIGNING_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Environment variable holding an `AccessKey\nSecretKey` credential
    #[arg(long, value_name = "VAR", conflicts_with = "secret")]
    pub credential_env: Option<String>,

    /// Use only this tier instead of the configured cascade
    #[arg(long, value_parser = parse_tier)]
    pub tier: Option<SigningTier>,
}

/// Execute the sign command.
pub async fn execute(args: SignArgs, config: Config) -> anyhow::Result<()> {
    let secret = resolve_secret(&args)?;
    let engine = SignatureEngine::new(config.signing);

    let signature = match args.tier {
        Some(tier) => engine.sign_with(tier, &secret, &args.message).await?,
        None => engine.sign(&secret, &args.message).await?,
    };
    engine.shutdown();

    println!("{signature}");
    Ok(())
}

fn resolve_secret(args: &SignArgs) -> anyhow::Result<String> {
    if let Some(secret) = args.secret.as_deref().filter(|s| !s.is_empty()) {
        return Ok(secret.to_string());
    }
    let var = args
        .credential_env
        .as_deref()
        .context("provide --secret, INFERLINK_SIGNING_SECRET or --credential-env")?;
    let raw = std::env::var(var).with_context(|| format!("environment variable {var} is not set"))?;
    let credential = ProviderCredential::new(raw);
    let (_, secret) = credential.signed_pair()?;
    Ok(secret.to_string())
}

fn parse_tier(raw: &str) -> Result<SigningTier, String> {
    SigningTier::ALL
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| {
            let names: Vec<&str> = SigningTier::ALL.iter().map(|t| t.as_str()).collect();
            format!("unknown tier '{raw}', expected one of: {}", names.join(", "))
        })
}
