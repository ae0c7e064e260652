//! Upload orchestrator - executes a request batch against the API
//!
//! Requests are issued one at a time in batch order. Each outcome becomes a
//! ledger entry; the ledger is persisted once at the end of the pass, also
//! when the pass stops early.

use super::classify::{classify, response_message, Outcome};
use super::summary::{UploadReport, UploadSummary};
use crate::adapters::phidb::{ApiRequest, ApiTransport};
use crate::config::{EndpointsConfig, UploadConfig};
use crate::core::build::RequestBatch;
use crate::core::ledger::{ErrorKind, LedgerEntry, LedgerStore, UploadStatus};
use crate::core::session::Session;
use crate::domain::{Kind, ParticipantId, PendingRequest, RequestKey, Result};
use crate::log_request_outcome;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

/// Executes request batches and keeps the ledger
pub struct UploadOrchestrator {
    transport: Arc<dyn ApiTransport>,
    store: LedgerStore,
    endpoints: EndpointsConfig,
    config: UploadConfig,
    shutdown: Option<watch::Receiver<bool>>,
}

impl UploadOrchestrator {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        store: LedgerStore,
        endpoints: EndpointsConfig,
        config: UploadConfig,
    ) -> Self {
        Self {
            transport,
            store,
            endpoints,
            config,
            shutdown: None,
        }
    }

    /// Observe `shutdown` between requests
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Execute `batch` with `session`
    ///
    /// A request key is attempted at most once; a repeated key is reported
    /// as a duplicate without a network call, and the ledger keeps the
    /// result of its first attempt. A dependent request whose
    /// patient failed earlier in this pass is ledgered as a missing
    /// dependency without a network call. A refused session token aborts
    /// the rest of the batch.
    ///
    /// # Errors
    ///
    /// Only ledger I/O fails the pass. Request failures are ledgered.
    pub async fn execute(&self, batch: RequestBatch, session: &Session) -> Result<UploadReport> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4();
        let dataset = batch.dataset().clone();
        let total = batch.len();

        let mut ledger = self.store.load(&dataset)?;
        let mut summary = UploadSummary::new(run_id, total);
        let mut entries: Vec<LedgerEntry> = Vec::with_capacity(total);
        let mut seen: HashSet<RequestKey> = HashSet::new();
        let mut failed_patients: HashSet<ParticipantId> = HashSet::new();

        tracing::info!(
            run_id = %run_id,
            dataset = %dataset,
            requests = total,
            "Starting upload"
        );

        for (index, request) in batch.into_iter().enumerate() {
            if self.shutdown_requested() {
                summary.interrupted = true;
                summary.not_attempted = total - index;
                tracing::warn!(
                    attempted = index,
                    remaining = total - index,
                    "Shutdown requested, stopping upload"
                );
                break;
            }

            let (entry, abort) = if !seen.insert(request.key()) {
                let entry = LedgerEntry::for_request(&request, run_id, UploadStatus::NotUploaded)
                    .with_error(ErrorKind::Duplicate)
                    .with_message("Repeated request in this batch, not sent");
                (entry, false)
            } else if let Some(patient) = request
                .dependency
                .as_ref()
                .filter(|p| failed_patients.contains(*p))
            {
                let entry = LedgerEntry::for_request(&request, run_id, UploadStatus::NotUploaded)
                    .with_error(ErrorKind::MissingDependency)
                    .with_message(format!(
                        "Participant {patient} was not uploaded in this pass, not sent"
                    ));
                (entry, false)
            } else {
                self.attempt(&request, session, run_id).await
            };

            if entry.kind == Kind::Patient
                && !entry.is_uploaded()
                && entry.error_kind != Some(ErrorKind::Duplicate)
            {
                failed_patients.insert(entry.participant_id.clone());
            }

            summary.record(&entry);
            entries.push(entry);

            if abort {
                summary.auth_failure = true;
                summary.not_attempted = total - index - 1;
                tracing::error!(
                    not_attempted = summary.not_attempted,
                    "Session token refused, aborting upload"
                );
                break;
            }
        }

        ledger.apply(&entries);
        self.store.persist(&ledger, &entries)?;

        summary.remaining = ledger.len();
        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();

        Ok(UploadReport { entries, summary })
    }

    /// Send one request and ledger its outcome; `true` aborts the pass
    async fn attempt(
        &self,
        request: &PendingRequest,
        session: &Session,
        run_id: Uuid,
    ) -> (LedgerEntry, bool) {
        let url = match session.endpoint_url(self.endpoints.for_kind(request.kind)) {
            Ok(url) => url,
            Err(e) => {
                let entry = LedgerEntry::for_request(request, run_id, UploadStatus::NotUploaded)
                    .with_error(ErrorKind::ServerRejected)
                    .with_message(e.to_string());
                return (entry, false);
            }
        };

        let api_request = ApiRequest {
            method: request.method,
            url,
            authorization: Some(session.token().clone()),
            body: Some(Value::Object(request.payload.clone())),
        };

        match self.transport.send(api_request).await {
            Ok(response) => {
                let Outcome {
                    status,
                    error_kind,
                    abort,
                } = classify(request.kind, &response, &self.config);

                let mut entry = LedgerEntry::for_request(request, run_id, status)
                    .with_http_status(response.status)
                    .with_message(response_message(&response));
                entry.error_kind = error_kind;

                match (status, error_kind) {
                    (UploadStatus::Uploaded, None) => {
                        log_request_outcome!(
                            info,
                            request.kind,
                            request.participant_id,
                            request.subtype,
                            response.status,
                            "Uploaded"
                        );
                    }
                    (_, Some(ErrorKind::Duplicate)) => {
                        log_request_outcome!(
                            info,
                            request.kind,
                            request.participant_id,
                            request.subtype,
                            response.status,
                            "Already present remotely"
                        );
                    }
                    _ => {
                        log_request_outcome!(
                            warn,
                            request.kind,
                            request.participant_id,
                            request.subtype,
                            response.status,
                            "Not uploaded"
                        );
                    }
                }
                (entry, abort)
            }
            Err(e) => {
                tracing::warn!(
                    kind = %request.kind,
                    remote_id = %request.participant_id,
                    error = %e,
                    "Request failed without a response"
                );
                let entry = LedgerEntry::for_request(request, run_id, UploadStatus::NotUploaded)
                    .with_error(ErrorKind::Transient)
                    .with_message(e.to_string());
                (entry, false)
            }
        }
    }
}
