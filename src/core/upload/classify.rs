//! Response classification

use crate::adapters::phidb::ApiResponse;
use crate::config::{DuplicatePolicy, UploadConfig};
use crate::core::ledger::{ErrorKind, UploadStatus};
use crate::domain::Kind;

const UNPROCESSABLE_ENTITY: u16 = 422;
const MAX_MESSAGE_LEN: usize = 500;

/// How a response is ledgered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub status: UploadStatus,
    pub error_kind: Option<ErrorKind>,
    /// Stop the pass after this request
    pub abort: bool,
}

impl Outcome {
    fn uploaded() -> Self {
        Self {
            status: UploadStatus::Uploaded,
            error_kind: None,
            abort: false,
        }
    }

    fn failed(error_kind: ErrorKind) -> Self {
        Self {
            status: UploadStatus::NotUploaded,
            error_kind: Some(error_kind),
            abort: false,
        }
    }
}

/// Classify the response to a request of `kind`
pub fn classify(kind: Kind, response: &ApiResponse, config: &UploadConfig) -> Outcome {
    match response.status {
        200..=299 => Outcome::uploaded(),
        401 | 403 => Outcome {
            abort: true,
            ..Outcome::failed(ErrorKind::Unauthorized)
        },
        UNPROCESSABLE_ENTITY => classify_unprocessable(kind, &response.body, config),
        408 | 429 | 500..=599 => Outcome::failed(ErrorKind::Transient),
        _ => Outcome::failed(ErrorKind::ServerRejected),
    }
}

fn classify_unprocessable(kind: Kind, body: &str, config: &UploadConfig) -> Outcome {
    let body = body.to_lowercase();
    let mentions = |markers: &[String]| {
        markers
            .iter()
            .map(|m| m.trim().to_lowercase())
            .any(|m| !m.is_empty() && body.contains(&m))
    };

    if mentions(&config.duplicate_markers) {
        return match (kind, config.patient_duplicate_policy) {
            (Kind::Patient, DuplicatePolicy::Uploaded) => Outcome {
                error_kind: Some(ErrorKind::Duplicate),
                ..Outcome::uploaded()
            },
            _ => Outcome::failed(ErrorKind::Duplicate),
        };
    }

    if mentions(&config.missing_dependency_markers) {
        return Outcome::failed(ErrorKind::MissingDependency);
    }

    Outcome::failed(ErrorKind::ServerRejected)
}

/// Short human-readable message for a response body
pub fn response_message(response: &ApiResponse) -> String {
    let body = response.body.trim();
    if body.is_empty() {
        return format!("HTTP {}", response.status);
    }

    let compact = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => body.split_whitespace().collect::<Vec<_>>().join(" "),
    };

    if compact.chars().count() > MAX_MESSAGE_LEN {
        let truncated: String = compact.chars().take(MAX_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        compact
    }
}
