//! Request gateway.
//!
//! [`Gateway::send`] is the single entry point for outbound inference calls:
//! it renders the adapter template, picks an authentication scheme, signs
//! the URL for the query-signed provider, retries transient failures,
//! interprets the response envelope and, when a polling descriptor is in
//! effect, awaits the asynchronous job.

pub mod envelope;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use envelope::{AudioPayload, GatewayResponse, HttpMethod, OutputType, RequestEnvelope};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

use crate::config::{Config, GatewayConfig, PollingConfig};
use crate::credential::ProviderCredential;
use crate::error::{GatewayError, Result};
use crate::signing::SignatureEngine;
use crate::template::{self, Params};
use crate::{extract, poller};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Body text the signed provider's edge returns when its own upstream stalls.
const EMBEDDED_TIMEOUT_MARKER: &str = "upstream request timeout";

const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Outbound gateway. Cheap to clone; clones share the transport and signer.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,
    polling: PollingConfig,
    signer: SignatureEngine,
    transport: Arc<dyn Transport>,
}

impl Gateway {
    /// Gateway over a real HTTP client.
    pub fn new(config: &Config) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                config: config.gateway.clone(),
                polling: config.polling.clone(),
                signer: SignatureEngine::new(config.signing.clone()),
                transport,
            }),
        }
    }

    pub fn signer(&self) -> &SignatureEngine {
        &self.inner.signer
    }

    pub(crate) fn polling_config(&self) -> &PollingConfig {
        &self.inner.polling
    }

    /// Send one request and return its final result.
    ///
    /// With a polling descriptor in effect the returned JSON is the
    /// normalized task result rather than the submit response.
    pub async fn send(
        &self,
        envelope: RequestEnvelope,
        credential: &ProviderCredential,
    ) -> Result<GatewayResponse> {
        let (response, origin) = self.exchange(&envelope, credential).await?;
        match (response, envelope.polling_descriptor()) {
            (GatewayResponse::Json(value), Some(descriptor)) => {
                poller::poll(self, value, descriptor, &origin, credential)
                    .await
                    .map(GatewayResponse::Json)
            }
            (response, _) => Ok(response),
        }
    }

    /// One request/response exchange without polling.
    ///
    /// Returns the interpreted response and the unsigned absolute URL, which
    /// the poller uses as the origin for relative status endpoints.
    pub(crate) async fn exchange(
        &self,
        envelope: &RequestEnvelope,
        credential: &ProviderCredential,
    ) -> Result<(GatewayResponse, Url)> {
        let target = envelope
            .adapter
            .as_ref()
            .and_then(|a| a.routing.endpoint.as_deref())
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(&envelope.url);
        let url = self.absolute_url(target)?;
        let signed = self.inner.signer.requires_signing(url.as_str());

        let body = match build_body(envelope, signed) {
            Some(value) if envelope.method.allows_body() => Some(serde_json::to_vec(&value)?),
            _ => None,
        };
        let headers = build_headers(envelope, credential, signed, body.is_some());

        // Credential problems surface here, before any provider I/O
        let request_url = if signed {
            self.inner.signer.sign_url(&url, credential).await?
        } else {
            url.clone()
        };

        let request = HttpRequest {
            method: envelope.method,
            url: request_url,
            headers,
            body,
        };
        let response = self.execute_with_retry(request, signed).await?;
        let output = interpret(response, signed, envelope.output_type)?;
        Ok((output, url))
    }

    fn absolute_url(&self, target: &str) -> Result<Url> {
        let target = target.trim();
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Url::parse(&self.inner.config.base_url)?.join(target)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Execute with the signed provider's retry policy.
    ///
    /// Unsigned requests get exactly one attempt. Non-retryable statuses are
    /// returned as responses for [`interpret`] to classify.
    async fn execute_with_retry(&self, request: HttpRequest, signed: bool) -> Result<HttpResponse> {
        let config = &self.inner.config;
        let max_attempts = if signed {
            config.signed_max_attempts.max(1)
        } else {
            1
        };
        let deadline = Duration::from_millis(config.request_timeout_ms);

        let mut attempt = 1;
        loop {
            tracing::debug!(
                method = %request.method,
                host = request.url.host_str().unwrap_or_default(),
                path = request.url.path(),
                attempt,
                max_attempts,
                transport = self.inner.transport.name(),
                "Sending request"
            );

            let error = match tokio::time::timeout(
                deadline,
                self.inner.transport.execute(request.clone()),
            )
            .await
            {
                Ok(Ok(response)) => {
                    if attempt < max_attempts && retry::is_retryable_status(response.status) {
                        let delay = retry::backoff_duration(attempt, config.status_retry_delay_ms);
                        tracing::warn!(
                            status = response.status,
                            attempt,
                            "Upstream gateway error, retrying in {delay:?}"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Ok(Err(e)) => e,
                Err(_) => GatewayError::transport(format!(
                    "request timed out after {}ms",
                    config.request_timeout_ms
                )),
            };

            if attempt < max_attempts && retry::is_retryable(&error) {
                let delay = retry::backoff_duration(attempt, config.transport_retry_delay_ms);
                tracing::warn!(attempt, "Network failure ({error}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(error);
        }
    }
}

/// Final request body: the rendered adapter template if one is configured,
/// otherwise the caller's body.
fn build_body(envelope: &RequestEnvelope, signed: bool) -> Option<Value> {
    let template = envelope
        .adapter
        .as_ref()
        .and_then(|a| a.structure_template.as_ref());
    let body = match template {
        Some(template) => {
            let params = match &envelope.body {
                Some(Value::Object(map)) => map.clone(),
                _ => Params::new(),
            };
            Some(template::render(template, &params))
        }
        None => envelope.body.clone(),
    };
    // The signed provider rejects URL fields with surrounding prose or whitespace
    if signed {
        body.map(|b| extract::sanitize_urls_deep(&b))
    } else {
        body
    }
}

fn build_headers(
    envelope: &RequestEnvelope,
    credential: &ProviderCredential,
    signed: bool,
    has_body: bool,
) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    if has_body {
        set_header(&mut headers, "Content-Type", "application/json");
    }
    if !signed {
        if let Some(bearer) = credential.bearer() {
            set_header(&mut headers, "Authorization", &bearer);
        }
    }
    if let Some(adapter) = &envelope.adapter {
        for (name, value) in &adapter.headers {
            set_header(&mut headers, name, value);
        }
    }
    for (name, value) in &envelope.headers {
        set_header(&mut headers, name, value);
    }
    if signed {
        // Authentication travels in the query string only
        headers.retain(|(name, _)| {
            !name.eq_ignore_ascii_case("authorization") && !name.eq_ignore_ascii_case("accesskey")
        });
    }
    headers
}

/// Insert or replace a header, matching names case-insensitively.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

/// Classify a raw response.
fn interpret(
    response: HttpResponse,
    signed: bool,
    output_type: Option<OutputType>,
) -> Result<GatewayResponse> {
    if !response.is_success() {
        let text = response.text();
        if signed && has_embedded_timeout(&text) {
            return Err(GatewayError::EmbeddedTransient(
                EMBEDDED_TIMEOUT_MARKER.to_string(),
            ));
        }
        let body = if text.trim().is_empty() {
            response.status_line()
        } else {
            text
        };
        return Err(GatewayError::HttpStatus {
            status: response.status,
            body,
        });
    }

    if output_type == Some(OutputType::Audio) {
        let content_type = response
            .content_type
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string());
        return Ok(GatewayResponse::Audio(AudioPayload {
            bytes: response.body,
            content_type,
        }));
    }

    if signed && has_embedded_timeout(&response.text()) {
        return Err(GatewayError::EmbeddedTransient(
            EMBEDDED_TIMEOUT_MARKER.to_string(),
        ));
    }
    let value: Value = serde_json::from_slice(&response.body)?;
    if signed {
        check_vendor_code(&value)?;
    }
    Ok(GatewayResponse::Json(value))
}

fn has_embedded_timeout(text: &str) -> bool {
    text.to_ascii_lowercase().contains(EMBEDDED_TIMEOUT_MARKER)
}

/// The signed provider reports failures as `{code != 0, msg}` inside a 2xx.
fn check_vendor_code(value: &Value) -> Result<()> {
    let code = value.get("code").and_then(|c| {
        c.as_i64()
            .or_else(|| c.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
    });
    let message = value.get("msg").and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) if code != 0 => Err(GatewayError::VendorLogical {
            code,
            message: message.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use crate::adapter::AdapterConfig;
    use crate::signing::{ACCESS_KEY_PARAM, SIGNATURE_PARAM};
    use serde_json::json;

    const SIGNED_URL: &str = "https://openapi.liblibai.cloud/api/generate/webui/text2img";

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.gateway.status_retry_delay_ms = 1;
        config.gateway.transport_retry_delay_ms = 1;
        config.polling.interval_ms = 1;
        config
    }

    fn gateway(transport: &Arc<MockTransport>) -> Gateway {
        Gateway::with_transport(&fast_config(), transport.clone())
    }

    fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_bearer_request_passes_json_through() {
        let transport = Arc::new(MockTransport::new().push_json(200, json!({"id": "chat-1"})));
        let gw = gateway(&transport);

        let envelope = RequestEnvelope::post("https://api.example/v1/chat", json!({"prompt": "hi"}));
        let resp = gw
            .send(envelope, &ProviderCredential::new("sk-test"))
            .await
            .unwrap();

        assert_eq!(resp.as_json(), Some(&json!({"id": "chat-1"})));
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(header(&requests[0], "authorization"), Some("Bearer sk-test"));
        assert_eq!(header(&requests[0], "content-type"), Some("application/json"));
        let body: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"prompt": "hi"}));
    }

    #[tokio::test]
    async fn test_relative_url_uses_base() {
        let transport = Arc::new(MockTransport::new().push_json(200, json!({})));
        let mut config = fast_config();
        config.gateway.base_url = "http://localhost:3000".to_string();
        let gw = Gateway::with_transport(&config, transport.clone());

        gw.send(
            RequestEnvelope::new(HttpMethod::Get, "/api/models"),
            &ProviderCredential::default(),
        )
        .await
        .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.url.as_str(), "http://localhost:3000/api/models");
        assert!(request.body.is_none());
        assert_eq!(header(request, "authorization"), None);
    }

    #[tokio::test]
    async fn test_template_replaces_body() {
        let transport = Arc::new(MockTransport::new().push_json(200, json!({"ok": true})));
        let gw = gateway(&transport);
        let adapter = AdapterConfig {
            structure_template: Some(json!({
                "model": "{{model}}",
                "input": {"prompt": "{{prompt}}", "negative": "{{negative}}"},
                "parameters": {"n": "{{n}}"}
            })),
            ..AdapterConfig::default()
        };

        let envelope = RequestEnvelope::post(
            "https://api.example/generate",
            json!({"model": "m1", "prompt": "a cat", "n": 2}),
        )
        .with_adapter(Arc::new(adapter));
        gw.send(envelope, &ProviderCredential::new("k")).await.unwrap();

        let body: Value =
            serde_json::from_slice(transport.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"model": "m1", "input": {"prompt": "a cat"}, "parameters": {"n": 2}})
        );
    }

    #[tokio::test]
    async fn test_adapter_headers_and_routing() {
        let transport = Arc::new(MockTransport::new().push_json(200, json!({})));
        let gw = gateway(&transport);
        let mut adapter = AdapterConfig::default();
        adapter.routing.endpoint = Some("https://dashscope.example/api/v1/t2i".to_string());
        adapter
            .headers
            .insert("X-DashScope-Async".to_string(), "enable".to_string());

        let envelope = RequestEnvelope::post("https://ignored.example/", json!({}))
            .with_adapter(Arc::new(adapter))
            .with_header("authorization", "Bearer override");
        gw.send(envelope, &ProviderCredential::new("k")).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.url.as_str(), "https://dashscope.example/api/v1/t2i");
        assert_eq!(header(request, "X-DashScope-Async"), Some("enable"));
        assert_eq!(header(request, "Authorization"), Some("Bearer override"));
    }

    #[tokio::test]
    async fn test_signed_request_uses_query_auth_only() {
        let transport = Arc::new(MockTransport::new().push_json(200, json!({"code": 0, "data": {}})));
        let gw = gateway(&transport);

        let envelope = RequestEnvelope::post(SIGNED_URL, json!({"templateUuid": "t"}))
            .with_header("Authorization", "Bearer leak")
            .with_header("AccessKey", "leak");
        gw.send(envelope, &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(header(request, "authorization"), None);
        assert_eq!(header(request, "accesskey"), None);
        let params: Vec<String> = request.url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert!(params.contains(&ACCESS_KEY_PARAM.to_string()));
        assert!(params.contains(&SIGNATURE_PARAM.to_string()));
    }

    #[tokio::test]
    async fn test_signed_body_urls_sanitized() {
        let transport = Arc::new(MockTransport::new().push_json(200, json!({"code": 0})));
        let gw = gateway(&transport);

        let envelope = RequestEnvelope::post(
            SIGNED_URL,
            json!({"sourceImage": " `https://cdn.example/a.png` see above", "prompt": "keep  spaces"}),
        );
        gw.send(envelope, &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap();

        let body: Value =
            serde_json::from_slice(transport.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["sourceImage"], "https://cdn.example/a.png");
        assert_eq!(body["prompt"], "keep  spaces");
    }

    #[tokio::test]
    async fn test_signed_missing_secret_fails_before_io() {
        let transport = Arc::new(MockTransport::new());
        let gw = gateway(&transport);

        let err = gw
            .send(
                RequestEnvelope::post(SIGNED_URL, json!({})),
                &ProviderCredential::new("only-access-key"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Config(_)));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_signed_retries_gateway_status() {
        let transport = Arc::new(
            MockTransport::new()
                .push_json(503, json!({}))
                .push_json(200, json!({"code": 0, "data": {"ok": true}})),
        );
        let gw = gateway(&transport);

        let resp = gw
            .send(RequestEnvelope::post(SIGNED_URL, json!({})), &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap();

        assert_eq!(resp.as_json().unwrap()["data"]["ok"], true);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_signed_gives_up_after_max_attempts() {
        let transport = Arc::new(
            MockTransport::new()
                .push_json(502, json!({}))
                .push_json(503, json!({}))
                .push_raw(504, "text/plain", b""),
        );
        let gw = gateway(&transport);

        let err = gw
            .send(RequestEnvelope::post(SIGNED_URL, json!({})), &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap_err();

        assert_eq!(transport.request_count(), 3);
        match err {
            GatewayError::HttpStatus { status, body } => {
                assert_eq!(status, 504);
                assert_eq!(body, "504 Gateway Timeout");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_signed_retries_network_failure() {
        let transport = Arc::new(
            MockTransport::new()
                .push_error("network connect error: connection reset")
                .push_json(200, json!({"code": 0})),
        );
        let gw = gateway(&transport);

        gw.send(RequestEnvelope::post(SIGNED_URL, json!({})), &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unsigned_does_not_retry() {
        let transport = Arc::new(
            MockTransport::new()
                .push_json(503, json!({"error": "busy"}))
                .push_json(200, json!({})),
        );
        let gw = gateway(&transport);

        let err = gw
            .send(
                RequestEnvelope::post("https://api.example/gen", json!({})),
                &ProviderCredential::new("k"),
            )
            .await
            .unwrap_err();

        assert_eq!(transport.request_count(), 1);
        assert!(matches!(err, GatewayError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_unsigned_network_failure_surfaces_immediately() {
        let transport = Arc::new(MockTransport::new().push_error("network error: reset"));
        let gw = gateway(&transport);

        let err = gw
            .send(
                RequestEnvelope::post("https://api.example/gen", json!({})),
                &ProviderCredential::new("k"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Transport { .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_vendor_logical_error() {
        let transport = Arc::new(
            MockTransport::new().push_json(200, json!({"code": 100010, "msg": "bad template"})),
        );
        let gw = gateway(&transport);

        let err = gw
            .send(RequestEnvelope::post(SIGNED_URL, json!({})), &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad template (code: 100010)");
    }

    #[tokio::test]
    async fn test_vendor_code_ignored_for_other_providers() {
        let body = json!({"code": 7, "msg": "not ours to judge"});
        let transport = Arc::new(MockTransport::new().push_json(200, body.clone()));
        let gw = gateway(&transport);

        let resp = gw
            .send(
                RequestEnvelope::post("https://api.example/gen", json!({})),
                &ProviderCredential::new("k"),
            )
            .await
            .unwrap();
        assert_eq!(resp.as_json(), Some(&body));
    }

    #[tokio::test]
    async fn test_embedded_upstream_timeout() {
        let transport = Arc::new(MockTransport::new().push_raw(
            500,
            "text/plain",
            b"Upstream request timeout",
        ));
        let gw = gateway(&transport);

        let err = gw
            .send(RequestEnvelope::post(SIGNED_URL, json!({})), &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EmbeddedTransient(_)));
    }

    #[tokio::test]
    async fn test_embedded_timeout_in_success_body() {
        let transport = Arc::new(MockTransport::new().push_json(
            200,
            json!({"code": 0, "data": {"detail": "upstream request timeout"}}),
        ));
        let gw = gateway(&transport);

        let err = gw
            .send(RequestEnvelope::post(SIGNED_URL, json!({})), &ProviderCredential::new("ak\nsk"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "upstream request timeout");
    }

    #[tokio::test]
    async fn test_audio_returns_raw_bytes() {
        let transport = Arc::new(MockTransport::new().push_raw(200, "audio/wav", b"RIFF\x00\x01"));
        let gw = gateway(&transport);

        let resp = gw
            .send(
                RequestEnvelope::post("https://api.example/tts", json!({"text": "hi"}))
                    .with_output_type(OutputType::Audio),
                &ProviderCredential::new("k"),
            )
            .await
            .unwrap();

        match resp {
            GatewayResponse::Audio(audio) => {
                assert_eq!(audio.bytes, b"RIFF\x00\x01");
                assert_eq!(audio.content_type, "audio/wav");
                assert!(audio.handle().starts_with("data:audio/wav;base64,"));
            }
            other => panic!("expected audio, got {other:?}"),
        }
    }

    #[test]
    fn test_check_vendor_code_requires_both_fields() {
        assert!(check_vendor_code(&json!({"code": 5})).is_ok());
        assert!(check_vendor_code(&json!({"msg": "x"})).is_ok());
        assert!(check_vendor_code(&json!({"code": "5", "msg": "x"})).is_ok());
        assert!(check_vendor_code(&json!({"code": 0, "msg": "ok"})).is_ok());
        assert!(check_vendor_code(&json!({"code": 5, "msg": "x"})).is_err());
    }
}
