//! Ordered request batches

use crate::core::ledger::Ledger;
use crate::domain::{DatasetName, Kind, PendingRequest, Result};
use std::collections::BTreeMap;

/// Requests of one dataset in upload order
///
/// Requests are stably sorted by [`Kind`] on construction, so every patient
/// precedes every acquisition and feature while file order is kept within a
/// kind. A dependent request can never come before its patient's request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBatch {
    dataset: DatasetName,
    requests: Vec<PendingRequest>,
}

impl RequestBatch {
    pub fn new(dataset: DatasetName, mut requests: Vec<PendingRequest>) -> Self {
        requests.sort_by_key(|request| request.kind);
        Self { dataset, requests }
    }

    pub fn empty(dataset: DatasetName) -> Self {
        Self {
            dataset,
            requests: Vec::new(),
        }
    }

    /// Rebuild the batch of every not_uploaded ledger entry
    pub fn from_ledger(ledger: &Ledger) -> Result<Self> {
        let requests = ledger
            .not_uploaded()
            .map(|entry| entry.to_request())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(ledger.dataset.clone(), requests))
    }

    pub fn dataset(&self) -> &DatasetName {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.requests.iter()
    }

    /// Requests of one kind, in batch order
    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &PendingRequest> {
        self.requests.iter().filter(move |r| r.kind == kind)
    }

    pub fn counts_by_kind(&self) -> BTreeMap<Kind, usize> {
        let mut counts = BTreeMap::new();
        for request in &self.requests {
            *counts.entry(request.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl IntoIterator for RequestBatch {
    type Item = PendingRequest;
    type IntoIter = std::vec::IntoIter<PendingRequest>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn request(kind: Kind, participant: &str) -> PendingRequest {
        let mut payload = json!({"remote_id": participant});
        if let Some(field) = kind.subtype_field() {
            payload[field] = Value::String("T1w".to_string());
        }
        let Value::Object(payload) = payload else {
            unreachable!()
        };
        PendingRequest::from_payload(kind, &DatasetName::new("WashU").unwrap(), payload).unwrap()
    }

    #[test]
    fn test_new_orders_by_kind_and_keeps_file_order() {
        let batch = RequestBatch::new(
            DatasetName::new("WashU").unwrap(),
            vec![
                request(Kind::Feature, "sub-1"),
                request(Kind::Acquisition, "sub-2"),
                request(Kind::Patient, "sub-2"),
                request(Kind::Acquisition, "sub-1"),
                request(Kind::Patient, "sub-1"),
            ],
        );

        let order: Vec<(Kind, &str)> = batch
            .iter()
            .map(|r| (r.kind, r.participant_id.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Kind::Patient, "sub-2"),
                (Kind::Patient, "sub-1"),
                (Kind::Acquisition, "sub-2"),
                (Kind::Acquisition, "sub-1"),
                (Kind::Feature, "sub-1"),
            ]
        );
    }

    #[test]
    fn test_counts_by_kind() {
        let batch = RequestBatch::new(
            DatasetName::new("WashU").unwrap(),
            vec![
                request(Kind::Patient, "sub-1"),
                request(Kind::Acquisition, "sub-1"),
                request(Kind::Acquisition, "sub-2"),
            ],
        );

        let counts = batch.counts_by_kind();
        assert_eq!(counts.get(&Kind::Patient), Some(&1));
        assert_eq!(counts.get(&Kind::Acquisition), Some(&2));
        assert_eq!(counts.get(&Kind::Feature), None);
        assert_eq!(batch.of_kind(Kind::Acquisition).count(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let batch = RequestBatch::empty(DatasetName::new("WashU").unwrap());
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
