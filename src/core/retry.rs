//! Resubmission of not_uploaded ledger entries

use crate::core::build::RequestBatch;
use crate::core::ledger::Ledger;
use crate::core::session::Session;
use crate::core::upload::{UploadOrchestrator, UploadReport};
use crate::domain::{DatasetName, Result};

/// Rebuilds a batch from the ledger and hands it to the orchestrator
pub struct RetryController<'a> {
    orchestrator: &'a UploadOrchestrator,
}

impl<'a> RetryController<'a> {
    pub fn new(orchestrator: &'a UploadOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// The current ledger of `dataset`
    pub fn ledger(&self, dataset: &DatasetName) -> Result<Ledger> {
        self.orchestrator.store().load(dataset)
    }

    /// Resubmit every not_uploaded entry of `ledger`
    ///
    /// Kind precedence is restored when the batch is rebuilt. An empty
    /// ledger sends nothing and leaves the ledger files untouched.
    pub async fn retry(&self, ledger: &Ledger, session: &Session) -> Result<UploadReport> {
        let batch = RequestBatch::from_ledger(ledger)?;
        if batch.is_empty() {
            tracing::info!(dataset = %ledger.dataset, "Nothing to retry");
            return Ok(UploadReport::empty());
        }

        tracing::info!(
            dataset = %ledger.dataset,
            requests = batch.len(),
            "Retrying not uploaded requests"
        );
        self.orchestrator.execute(batch, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::phidb::{ApiRequest, ApiResponse, ApiTransport};
    use crate::config::{secret_string, EndpointsConfig, UploadConfig};
    use crate::core::layout::ApiLayout;
    use crate::core::ledger::{ErrorKind, LedgerEntry, LedgerStore, UploadStatus};
    use crate::domain::{Kind, PendingRequest};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;
    use uuid::Uuid;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        paths: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ApiTransport for Counting {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.paths.lock().unwrap().push(request.url.path().to_string());
            Ok(ApiResponse::new(201, "{}"))
        }
    }

    fn session() -> Session {
        Session::new(
            Url::parse("https://phidb.example.org/api/v1").unwrap(),
            "me@example.org",
            secret_string("Bearer t".to_string()),
        )
    }

    fn failed(kind: Kind, participant: &str) -> LedgerEntry {
        let mut payload = Map::new();
        payload.insert("remote_id".to_string(), json!(participant));
        if let Some(field) = kind.subtype_field() {
            payload.insert(field.to_string(), json!("T1w"));
        }
        let dataset = DatasetName::new("WashU").unwrap();
        let request = PendingRequest::from_payload(kind, &dataset, payload).unwrap();
        LedgerEntry::for_request(&request, Uuid::new_v4(), UploadStatus::NotUploaded)
            .with_error(ErrorKind::Transient)
    }

    fn setup(dir: &TempDir) -> (UploadOrchestrator, Arc<Counting>) {
        let transport = Arc::new(Counting::default());
        let orchestrator = UploadOrchestrator::new(
            transport.clone(),
            LedgerStore::new(ApiLayout::new(dir.path())),
            EndpointsConfig::default(),
            UploadConfig::default(),
        );
        (orchestrator, transport)
    }

    #[tokio::test]
    async fn test_empty_ledger_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, transport) = setup(&dir);
        let controller = RetryController::new(&orchestrator);
        let dataset = DatasetName::new("WashU").unwrap();

        let ledger = controller.ledger(&dataset).unwrap();
        let report = controller.retry(&ledger, &session()).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(report.entries.is_empty());
        assert!(!orchestrator.store().layout().ledger_path(&dataset).exists());
    }

    #[tokio::test]
    async fn test_retry_restores_kind_order_and_clears_ledger() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, transport) = setup(&dir);
        let dataset = DatasetName::new("WashU").unwrap();

        let mut ledger = Ledger::new(dataset.clone());
        ledger.entries = vec![failed(Kind::Acquisition, "sub-1"), failed(Kind::Patient, "sub-1")];
        orchestrator.store().persist(&ledger, &[]).unwrap();

        let controller = RetryController::new(&orchestrator);
        let ledger = controller.ledger(&dataset).unwrap();
        let report = controller.retry(&ledger, &session()).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *transport.paths.lock().unwrap(),
            vec!["/api/v1/patients", "/api/v1/imaging_acquisitions"]
        );
        assert!(report.summary.is_successful());
        assert!(controller.ledger(&dataset).unwrap().is_empty());
    }
}
