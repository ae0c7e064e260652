//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use phi_uploader::adapters::phidb::{ApiRequest, ApiResponse, ApiTransport};
use phi_uploader::config::{secret_string, ApiConfig, EndpointsConfig, UploadConfig};
use phi_uploader::core::layout::ApiLayout;
use phi_uploader::core::ledger::LedgerStore;
use phi_uploader::core::session::{Session, SessionManager};
use phi_uploader::core::upload::UploadOrchestrator;
use phi_uploader::domain::Result;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const EMAIL: &str = "uploader@example.org";
pub const PASSWORD: &str = "correct horse";
pub const TOKEN: &str = "Bearer fake-token";
pub const BASE_URL: &str = "https://phidb.example.org/api/v1";

/// A request as the fake server saw it
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub remote_id: Option<String>,
    pub subtype: Option<String>,
}

#[derive(Default)]
struct State {
    patients: HashSet<String>,
    records: HashSet<(String, String, String)>,
    injected: HashMap<(String, String), VecDeque<u16>>,
    token_uses_left: Option<usize>,
    received: Vec<Received>,
}

/// In-memory PhiDB
///
/// Acquisitions and features need their patient to exist, and every record
/// can be created once. Failures can be injected per endpoint and
/// participant.
#[derive(Default)]
pub struct FakePhiDb {
    state: Mutex<State>,
}

impl FakePhiDb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer the next request for `remote_id` on `endpoint` with `status`
    pub fn fail_next(&self, endpoint: &str, remote_id: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .injected
            .entry((endpoint.to_string(), remote_id.to_string()))
            .or_default()
            .push_back(status);
    }

    /// Refuse the session token after `uses` more authorized requests
    pub fn revoke_token_after(&self, uses: usize) {
        self.state.lock().unwrap().token_uses_left = Some(uses);
    }

    /// Data requests received so far, login excluded
    pub fn received(&self) -> Vec<Received> {
        self.state.lock().unwrap().received.clone()
    }

    pub fn received_on(&self, endpoint: &str) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.path.ends_with(&format!("/{endpoint}")))
            .collect()
    }

    fn sign_in(&self, body: &Value) -> ApiResponse {
        let email = body.get("email").and_then(Value::as_str);
        let password = body.get("password").and_then(Value::as_str);
        if email == Some(EMAIL) && password == Some(PASSWORD) {
            ApiResponse::new(200, r#"{"email": "uploader@example.org"}"#)
                .with_header("Authorization", TOKEN)
        } else {
            ApiResponse::new(401, r#"{"error": "Invalid email or password."}"#)
        }
    }

    fn create(&self, state: &mut State, endpoint: &str, body: &Value) -> ApiResponse {
        let remote_id = text(body, "remote_id").unwrap_or_default();

        if let Some(status) = state
            .injected
            .get_mut(&(endpoint.to_string(), remote_id.clone()))
            .and_then(VecDeque::pop_front)
        {
            return ApiResponse::new(status, "Service Unavailable");
        }

        if endpoint == "patients" {
            if !state.patients.insert(remote_id) {
                return ApiResponse::new(422, r#"{"remote_id": ["has already been taken"]}"#);
            }
            return ApiResponse::new(201, "{}");
        }

        if !state.patients.contains(&remote_id) {
            return ApiResponse::new(422, r#"{"patient": ["must exist"]}"#);
        }
        let subtype = text(body, "acquisition_type")
            .or_else(|| text(body, "feature_type"))
            .unwrap_or_default();
        if !state.records.insert((endpoint.to_string(), remote_id, subtype)) {
            return ApiResponse::new(422, r#"{"remote_id": ["has already been taken"]}"#);
        }
        ApiResponse::new(201, "{}")
    }
}

fn text(body: &Value, field: &str) -> Option<String> {
    body.get(field).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl ApiTransport for FakePhiDb {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let path = request.url.path().to_string();
        let body = request.body.unwrap_or(Value::Null);

        if path.ends_with("/auth/sign_in") {
            return Ok(self.sign_in(&body));
        }

        let mut state = self.state.lock().unwrap();
        state.received.push(Received {
            path: path.clone(),
            remote_id: text(&body, "remote_id"),
            subtype: text(&body, "acquisition_type").or_else(|| text(&body, "feature_type")),
        });

        let authorized = request
            .authorization
            .as_ref()
            .is_some_and(|t| t.expose_secret().as_ref() == TOKEN);
        let revoked = match state.token_uses_left.as_mut() {
            Some(0) => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        };
        if !authorized || revoked {
            return Ok(ApiResponse::new(401, r#"{"error": "You need to sign in"}"#));
        }

        let endpoint = path.rsplit('/').next().unwrap_or_default().to_string();
        Ok(self.create(&mut state, &endpoint, &body))
    }
}

pub fn api_config() -> ApiConfig {
    ApiConfig {
        base_url: BASE_URL.to_string(),
        ..Default::default()
    }
}

pub async fn login(server: &Arc<FakePhiDb>) -> Session {
    SessionManager::new(server.clone(), &api_config())
        .unwrap()
        .login(EMAIL, &secret_string(PASSWORD.to_string()))
        .await
        .unwrap()
}

pub fn orchestrator(server: &Arc<FakePhiDb>, root: &Path) -> UploadOrchestrator {
    UploadOrchestrator::new(
        server.clone(),
        LedgerStore::new(ApiLayout::new(root)),
        EndpointsConfig::default(),
        UploadConfig::default(),
    )
}

/// Write a tab-separated table under `dir`
pub fn write_tsv(dir: &Path, name: &str, header: &[&str], rows: &[&[&str]]) -> PathBuf {
    let mut content = header.join("\t");
    content.push('\n');
    for row in rows {
        content.push_str(&row.join("\t"));
        content.push('\n');
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
