//! reqwest-backed transport
//!
//! Retries connection failures, timeouts and 429 responses with
//! exponential backoff. Other statuses are returned to the caller as-is.

use super::transport::{ApiRequest, ApiResponse, ApiTransport};
use crate::config::{ApiConfig, RetryConfig};
use crate::domain::{ApiError, HttpMethod, Result, UploaderError};
use crate::log_retry_attempt;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use std::time::Duration;

const TOO_MANY_REQUESTS: u16 = 429;

/// HTTP transport for the PhiDB API
pub struct HttpTransport {
    client: Client,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Build the HTTP client from the API configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TLS backend can't be initialized.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .default_headers(default_headers)
            .user_agent(concat!("phi-uploader/", env!("CARGO_PKG_VERSION")));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            UploaderError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    async fn send_once(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, reqwest::Error> {
        let method = match request.method {
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, request.url.clone());
        if let Some(authorization) = &request.authorization {
            builder = builder.header(AUTHORIZATION, authorization.expose_secret().as_ref());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    /// Delay before retrying a 429, honoring `Retry-After` seconds
    fn rate_limit_delay_ms(&self, response: &ApiResponse, attempt: usize) -> u64 {
        response
            .header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|seconds| seconds.saturating_mul(1000).min(self.retry.max_delay_ms))
            .unwrap_or_else(|| self.retry.delay_ms(attempt))
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let max_retries = self.retry.max_retries;
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(response) if response.status == TOO_MANY_REQUESTS && attempt < max_retries => {
                    attempt += 1;
                    let delay_ms = self.rate_limit_delay_ms(&response, attempt);
                    log_retry_attempt!(attempt, max_retries, delay_ms, "429 Too Many Requests");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(response) => return Ok(response),
                Err(e) if is_retryable(&e) && attempt < max_retries => {
                    attempt += 1;
                    let delay_ms = self.retry.delay_ms(attempt);
                    log_retry_attempt!(attempt, max_retries, delay_ms, e);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => {
                    tracing::error!(
                        url = %request.url,
                        attempts = attempt + 1,
                        error = %e,
                        "Request failed"
                    );
                    return Err(map_transport_error(e).into());
                }
            }
        }
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

fn map_transport_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout(error.to_string())
    } else if error.is_decode() || error.is_body() {
        ApiError::InvalidResponse(error.to_string())
    } else {
        ApiError::ConnectionFailed(error.to_string())
    }
}
