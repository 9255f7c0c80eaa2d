//! The `inferlink send` command.

use anyhow::Context;
use clap::Args;
use inferlink_core::{Config, GatewayResponse, Inferlink, Params};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Arguments for the `send` command.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Provider id from `[providers.<id>]`
    pub provider: String,

    /// Model to use (defaults to the provider's first listed model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Request parameter as key=value; values are parsed as JSON when possible
    #[arg(short, long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// JSON object file with request parameters (merged before --param)
    #[arg(long, value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the send command.
pub async fn execute(args: SendArgs, config: Config) -> anyhow::Result<()> {
    let params = collect_params(&args)?;
    let inferlink = Inferlink::new(config);

    let response = inferlink
        .send(&args.provider, params)
        .await
        .with_context(|| format!("request to provider '{}' failed", args.provider))?;

    match &args.output {
        Some(path) => {
            let path = expand(path);
            write_response(&response, &path)?;
            tracing::info!("Result written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&response.to_json())?),
    }
    Ok(())
}

/// Merge `--params-file`, `--param` and `--model` into one bag, later wins.
fn collect_params(args: &SendArgs) -> anyhow::Result<Params> {
    let mut params = match &args.params_file {
        Some(path) => {
            let path = expand(path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => anyhow::bail!("{} must contain a JSON object", path.display()),
            }
        }
        None => Params::new(),
    };

    for raw in &args.params {
        let (key, value) = parse_param(raw)?;
        params.insert(key, value);
    }
    if let Some(model) = &args.model {
        params.insert("model".to_string(), Value::String(model.clone()));
    }
    Ok(params)
}

/// Parse `key=value`. The value is JSON if it parses as JSON, else a string.
fn parse_param(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("parameter name is empty in '{raw}'");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn write_response(response: &GatewayResponse, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match response {
        GatewayResponse::Audio(audio) => std::fs::write(path, &audio.bytes)?,
        GatewayResponse::Json(value) => std::fs::write(path, serde_json::to_vec_pretty(value)?)?,
    }
    Ok(())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
