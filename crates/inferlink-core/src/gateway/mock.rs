//! Scripted transport for unit tests.

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_json(self, status: u16, body: Value) -> Self {
        self.push(Ok(HttpResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        }))
    }

    pub(crate) fn push_raw(self, status: u16, content_type: &str, body: &[u8]) -> Self {
        self.push(Ok(HttpResponse {
            status,
            content_type: Some(content_type.to_string()),
            body: body.to_vec(),
        }))
    }

    pub(crate) fn push_error(self, message: &str) -> Self {
        self.push(Err(GatewayError::transport(message)))
    }

    fn push(self, item: Result<HttpResponse>) -> Self {
        self.script.lock().unwrap().push_back(item);
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::transport("mock script exhausted")))
    }
}
