//! Authenticated session
//!
//! A run logs in exactly once. [`SessionManager::login`] consumes the
//! manager, so a second login in the same run does not type-check. The
//! resulting [`Session`] is passed explicitly to everything that talks to
//! the API.

use crate::adapters::phidb::{ApiRequest, ApiTransport};
use crate::config::{secret_string, ApiConfig, SecretString};
use crate::domain::{ApiError, Result, UploaderError};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Parse the API base URL
pub fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url.trim())
        .map_err(|e| UploaderError::Configuration(format!("Invalid base URL '{base_url}': {e}")))
}

/// Join `endpoint` onto `base`, keeping the base path
pub fn endpoint_url(base: &Url, endpoint: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(endpoint.trim_start_matches('/')).map_err(|e| {
        UploaderError::Configuration(format!("Invalid endpoint '{endpoint}': {e}"))
    })
}

/// An authenticated session with the API
#[derive(Debug, Clone)]
pub struct Session {
    base_url: Url,
    email: String,
    token: SecretString,
    established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(base_url: Url, email: impl Into<String>, token: SecretString) -> Self {
        Self {
            base_url,
            email: email.into(),
            token,
            established_at: Utc::now(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Value of the `Authorization` header for every request
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        endpoint_url(&self.base_url, endpoint)
    }
}

/// Performs the single login of a run
pub struct SessionManager {
    transport: Arc<dyn ApiTransport>,
    base_url: Url,
    sign_in: String,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn ApiTransport>, config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            transport,
            base_url: parse_base_url(&config.base_url)?,
            sign_in: config.endpoints.sign_in.clone(),
        })
    }

    /// Sign in and return the session
    ///
    /// # Errors
    ///
    /// - [`UploaderError::Authentication`] when the credentials are refused
    ///   or the response carries no `Authorization` header
    /// - [`UploaderError::Api`] when the server can't be reached or fails
    pub async fn login(self, email: &str, password: &SecretString) -> Result<Session> {
        let email = email.trim();
        if email.is_empty() {
            return Err(UploaderError::Authentication("Email is required".to_string()));
        }
        if password.expose_secret().is_empty() {
            return Err(UploaderError::Authentication("Password is required".to_string()));
        }

        let url = endpoint_url(&self.base_url, &self.sign_in)?;
        tracing::info!(url = %url, email = %email, "Signing in");

        let body = json!({
            "email": email,
            "password": password.expose_secret().as_ref(),
        });
        let response = self.transport.send(ApiRequest::post(url, body)).await?;

        match response.status {
            200..=299 => {
                let token = response
                    .header("authorization")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        UploaderError::Authentication(
                            "Login succeeded but the response has no Authorization header"
                                .to_string(),
                        )
                    })?;

                tracing::info!(email = %email, "Signed in");
                Ok(Session::new(
                    self.base_url,
                    email,
                    secret_string(token.to_string()),
                ))
            }
            401 | 403 | 422 => {
                tracing::error!(email = %email, status = response.status, "Login refused");
                Err(UploaderError::Authentication(format!(
                    "Invalid credentials (HTTP {})",
                    response.status
                )))
            }
            status if (400..500).contains(&status) => Err(UploaderError::Authentication(format!(
                "Login rejected with HTTP {status}"
            ))),
            status => Err(ApiError::InvalidResponse(format!("Login failed with HTTP {status}")).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::phidb::ApiResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneShot {
        response: ApiResponse,
        seen: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl ApiTransport for OneShot {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(self.response.clone())
        }
    }

    fn manager(response: ApiResponse) -> (SessionManager, Arc<OneShot>) {
        let transport = Arc::new(OneShot {
            response,
            seen: Mutex::new(Vec::new()),
        });
        let config = ApiConfig {
            base_url: "https://phidb.example.org/api/v1".to_string(),
            ..Default::default()
        };
        (SessionManager::new(transport.clone(), &config).unwrap(), transport)
    }

    fn password() -> SecretString {
        secret_string("hunter2".to_string())
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let base = Url::parse("https://phidb.example.org/api/v1").unwrap();
        assert_eq!(
            endpoint_url(&base, "imaging_acquisitions").unwrap().as_str(),
            "https://phidb.example.org/api/v1/imaging_acquisitions"
        );
        let base = Url::parse("https://phidb.example.org/api/v1/").unwrap();
        assert_eq!(
            endpoint_url(&base, "/auth/sign_in").unwrap().as_str(),
            "https://phidb.example.org/api/v1/auth/sign_in"
        );
    }

    #[tokio::test]
    async fn test_login_reads_authorization_header() {
        let (manager, transport) =
            manager(ApiResponse::new(200, "{}").with_header("Authorization", "Bearer abc"));

        let session = manager.login("me@example.org", &password()).await.unwrap();
        assert_eq!(session.token().expose_secret().as_ref(), "Bearer abc");
        assert_eq!(session.email(), "me@example.org");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url.path(), "/api/v1/auth/sign_in");
        assert_eq!(
            seen[0].body.as_ref().unwrap(),
            &json!({"email": "me@example.org", "password": "hunter2"})
        );
    }

    #[tokio::test]
    async fn test_login_without_header_fails() {
        let (manager, _) = manager(ApiResponse::new(200, "{}"));
        let result = manager.login("me@example.org", &password()).await;
        assert!(matches!(result, Err(UploaderError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_login_refused() {
        let (manager, _) = manager(ApiResponse::new(401, r#"{"errors":["Invalid login credentials"]}"#));
        let result = manager.login("me@example.org", &password()).await;
        assert!(matches!(result, Err(UploaderError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_login_server_error() {
        let (manager, _) = manager(ApiResponse::new(503, ""));
        let result = manager.login("me@example.org", &password()).await;
        assert!(matches!(result, Err(UploaderError::Api(_))));
    }

    #[tokio::test]
    async fn test_login_requires_credentials_before_network() {
        let (manager, transport) = manager(ApiResponse::new(200, ""));
        let result = manager.login("  ", &password()).await;
        assert!(matches!(result, Err(UploaderError::Authentication(_))));
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
