//! Trusted remote signing endpoint.
//!
//! Used only when no local computation path is enabled. The endpoint takes
//! `{secret, message}` and answers `{signature}`.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct SignRequest<'a> {
    secret: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

/// Ask the remote endpoint for a signature.
pub(crate) async fn sign_remote(
    client: &reqwest::Client,
    endpoint: &str,
    timeout: Duration,
    secret: &str,
    message: &str,
) -> Result<String> {
    let resp = client
        .post(endpoint)
        .json(&SignRequest { secret, message })
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| GatewayError::Signing(format!("remote signer request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(GatewayError::Signing(format!(
            "remote signer returned HTTP {}",
            status.as_u16()
        )));
    }

    let body: SignResponse = resp
        .json()
        .await
        .map_err(|e| GatewayError::Signing(format!("remote signer sent invalid body: {e}")))?;

    if body.signature.is_empty() {
        return Err(GatewayError::Signing(
            "remote signer returned an empty signature".to_string(),
        ));
    }
    Ok(body.signature)
}
