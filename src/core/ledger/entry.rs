//! Ledger entries

use crate::domain::{DatasetName, Kind, ParticipantId, PendingRequest, RequestKey, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Upload status of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Uploaded,
    NotUploaded,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::NotUploaded => "not_uploaded",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a request that did not succeed cleanly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The participant does not exist remotely
    MissingDependency,
    /// The record already exists remotely, or repeats a key in the batch
    Duplicate,
    /// The server refused the payload
    ServerRejected,
    /// Timeouts, rate limiting, server errors and connection failures
    Transient,
    /// The session token was refused mid-batch
    Unauthorized,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingDependency => "MissingDependency",
            ErrorKind::Duplicate => "Duplicate",
            ErrorKind::ServerRejected => "ServerRejected",
            ErrorKind::Transient => "Transient",
            ErrorKind::Unauthorized => "Unauthorized",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one attempted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub participant_id: ParticipantId,
    pub kind: Kind,
    pub dataset: DatasetName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub status: UploadStatus,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub message: String,
    /// Request body, kept so the request can be rebuilt
    pub payload: Map<String, Value>,
    pub attempted_at: DateTime<Utc>,
    pub run_id: Uuid,
}

impl LedgerEntry {
    /// Entry for an attempt of `request`
    pub fn for_request(request: &PendingRequest, run_id: Uuid, status: UploadStatus) -> Self {
        Self {
            participant_id: request.participant_id.clone(),
            kind: request.kind,
            dataset: request.dataset.clone(),
            subtype: request.subtype.clone(),
            status,
            error_kind: None,
            http_status: None,
            message: String::new(),
            payload: request.payload.clone(),
            attempted_at: Utc::now(),
            run_id,
        }
    }

    pub fn with_error(mut self, error_kind: ErrorKind) -> Self {
        self.error_kind = Some(error_kind);
        self
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            dataset: self.dataset.clone(),
            participant_id: self.participant_id.clone(),
            kind: self.kind,
            subtype: self.subtype.clone(),
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == UploadStatus::Uploaded
    }

    /// Rebuild the request this entry was recorded for
    pub fn to_request(&self) -> Result<PendingRequest> {
        let mut request = PendingRequest::from_payload(self.kind, &self.dataset, self.payload.clone())?;
        request.participant_id = self.participant_id.clone();
        request.subtype = self.subtype.clone();
        request.dependency = self
            .kind
            .depends_on_patient()
            .then(|| self.participant_id.clone());
        Ok(request)
    }
}

/// The not_uploaded ledger of one dataset
///
/// Holds only requests that are still to be uploaded. Uploaded requests are
/// reported in the uploaded summaries instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub dataset: DatasetName,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new(dataset: DatasetName) -> Self {
        Self {
            dataset,
            updated_at: None,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn not_uploaded(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(|e| !e.is_uploaded())
    }

    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Fold the results of a pass into the ledger
    ///
    /// An attempted key replaces its previous entry, and is dropped entirely
    /// once uploaded. Keys that were not attempted stay as they were. Within
    /// one pass the first result of a key wins; later repeats are ignored.
    pub fn apply(&mut self, results: &[LedgerEntry]) {
        let mut applied: HashSet<RequestKey> = HashSet::new();
        for result in results {
            let key = result.key();
            if !applied.insert(key.clone()) {
                continue;
            }
            self.entries.retain(|entry| entry.key() != key);
            if !result.is_uploaded() {
                self.entries.push(result.clone());
            }
        }
        self.entries.sort_by_key(|entry| entry.kind);
        self.updated_at = Some(Utc::now());
    }
}
