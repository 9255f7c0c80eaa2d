//! Provider-neutral request envelope and gateway response.

use crate::adapter::{AdapterConfig, PollingDescriptor};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// HTTP method of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether a request body may be sent with this method.
    pub fn allows_body(self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared kind of output the provider returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Image,
    Text,
    Video,
    /// Raw binary body; JSON parsing is skipped
    Audio,
    #[serde(other)]
    Other,
}

/// One outbound call. Built per request, consumed by [`super::Gateway::send`].
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: HttpMethod,
    /// Absolute URL, or a path resolved against `gateway.base_url`
    pub url: String,
    /// Caller body. With an adapter template this is the flat parameter bag.
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub output_type: Option<OutputType>,
    pub polling: Option<PollingDescriptor>,
    pub adapter: Option<Arc<AdapterConfig>>,
}

impl RequestEnvelope {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: BTreeMap::new(),
            output_type: None,
            polling: None,
            adapter: None,
        }
    }

    /// `POST` with a JSON body.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = Some(output_type);
        self
    }

    pub fn with_polling(mut self, descriptor: PollingDescriptor) -> Self {
        self.polling = Some(descriptor);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<AdapterConfig>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Polling descriptor in effect: the envelope's own, else the adapter's.
    pub fn polling_descriptor(&self) -> Option<&PollingDescriptor> {
        self.polling
            .as_ref()
            .or_else(|| self.adapter.as_ref()?.response_path.as_ref())
    }
}

/// Raw audio body plus a locally playable handle.
#[derive(Clone)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl AudioPayload {
    /// `data:` URL that media players accept directly.
    pub fn handle(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioPayload")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Final result of a gateway call.
#[derive(Debug, Clone)]
pub enum GatewayResponse {
    Json(Value),
    Audio(AudioPayload),
}

impl GatewayResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            GatewayResponse::Json(value) => Some(value),
            GatewayResponse::Audio(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            GatewayResponse::Json(value) => Some(value),
            GatewayResponse::Audio(_) => None,
        }
    }

    /// JSON view for display; audio is summarized by its handle.
    pub fn to_json(&self) -> Value {
        match self {
            GatewayResponse::Json(value) => value.clone(),
            GatewayResponse::Audio(audio) => json!({
                "audio": audio.handle(),
                "content_type": audio.content_type,
                "bytes": audio.bytes.len(),
            }),
        }
    }
}
