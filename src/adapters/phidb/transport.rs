//! Transport trait for the PhiDB REST API
//!
//! The session manager and the upload orchestrator talk to the API only
//! through [`ApiTransport`], so they can be driven by a scripted transport
//! in tests.

use crate::config::SecretString;
use crate::domain::{HttpMethod, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// A single HTTP request to the API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: Url,
    /// Value of the `Authorization` header, if any
    pub authorization: Option<SecretString>,
    /// JSON body
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn post(url: Url, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url,
            authorization: None,
            body: Some(body),
        }
    }

    pub fn with_authorization(mut self, authorization: SecretString) -> Self {
        self.authorization = Some(authorization);
        self
    }
}

/// Status, headers and body text of an API response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Synchronous call/response access to the API
///
/// `Err` means the request never produced an HTTP response (connection
/// failure, timeout) after any transport-level retries. Every HTTP status,
/// including 4xx and 5xx, is an `Ok` response.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}
