//! Pending API requests

use crate::domain::errors::UploaderError;
use crate::domain::ids::{DatasetName, ParticipantId};
use crate::domain::record::{Kind, ValidatedRecord};
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// HTTP method of a request
///
/// PhiDB creates every record kind with a POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a request within a dataset
///
/// The remote service accepts one acquisition or feature of a given type
/// per participant, so the subtype is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    pub dataset: DatasetName,
    pub participant_id: ParticipantId,
    pub kind: Kind,
    pub subtype: Option<String>,
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dataset, self.kind, self.participant_id)?;
        if let Some(subtype) = &self.subtype {
            write!(f, "/{subtype}")?;
        }
        Ok(())
    }
}

/// One HTTP request waiting to be issued
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub method: HttpMethod,
    pub kind: Kind,
    pub dataset: DatasetName,
    pub participant_id: ParticipantId,
    pub subtype: Option<String>,
    pub payload: Map<String, Value>,
    /// Participant that must already exist remotely
    pub dependency: Option<ParticipantId>,
}

impl PendingRequest {
    /// Create a request from a validated record
    pub fn from_record(record: ValidatedRecord, dataset: &DatasetName) -> Self {
        let dependency = record
            .kind
            .depends_on_patient()
            .then(|| record.participant_id.clone());

        Self {
            method: HttpMethod::Post,
            kind: record.kind,
            dataset: dataset.clone(),
            participant_id: record.participant_id,
            subtype: record.subtype,
            payload: record.payload,
            dependency,
        }
    }

    /// Recreate a request from a previously serialized payload
    ///
    /// Used when loading collection artifacts and ledger entries. The
    /// participant comes from `remote_id`, the subtype from the kind's
    /// subtype column.
    pub fn from_payload(kind: Kind, dataset: &DatasetName, payload: Map<String, Value>) -> Result<Self> {
        let participant_id = payload
            .get("remote_id")
            .and_then(value_as_text)
            .ok_or_else(|| {
                UploaderError::Serialization(format!(
                    "{kind} payload has no remote_id: {}",
                    Value::Object(payload.clone())
                ))
            })
            .and_then(|id| ParticipantId::new(id).map_err(UploaderError::Serialization))?;

        let subtype = kind
            .subtype_field()
            .and_then(|field| payload.get(field))
            .and_then(value_as_text);

        let dependency = kind.depends_on_patient().then(|| participant_id.clone());

        Ok(Self {
            method: HttpMethod::Post,
            kind,
            dataset: dataset.clone(),
            participant_id,
            subtype,
            payload,
            dependency,
        })
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            dataset: self.dataset.clone(),
            participant_id: self.participant_id.clone(),
            kind: self.kind,
            subtype: self.subtype.clone(),
        }
    }
}

/// Text form of a scalar JSON value, `None` for null, blanks and containers
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset() -> DatasetName {
        DatasetName::new("WashU").unwrap()
    }

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_payload_acquisition() {
        let request = PendingRequest::from_payload(
            Kind::Acquisition,
            &dataset(),
            payload(json!({"remote_id": "sub-1", "acquisition_type": "T1w"})),
        )
        .unwrap();

        assert_eq!(request.participant_id.as_str(), "sub-1");
        assert_eq!(request.subtype.as_deref(), Some("T1w"));
        assert_eq!(request.dependency.as_ref().map(|p| p.as_str()), Some("sub-1"));
        assert_eq!(request.method, HttpMethod::Post);
    }

    #[test]
    fn test_method_is_post() {
        assert_eq!(HttpMethod::default(), HttpMethod::Post);
        assert_eq!(serde_json::to_string(&HttpMethod::Post).unwrap(), "\"POST\"");
        assert!(serde_json::from_str::<HttpMethod>("\"GET\"").is_err());
    }

    #[test]
    fn test_from_payload_patient_has_no_dependency() {
        let request = PendingRequest::from_payload(
            Kind::Patient,
            &dataset(),
            payload(json!({"remote_id": 17, "data_id": 17})),
        )
        .unwrap();

        assert_eq!(request.participant_id.as_str(), "17");
        assert!(request.dependency.is_none());
        assert!(request.subtype.is_none());
    }

    #[test]
    fn test_from_payload_requires_remote_id() {
        let result = PendingRequest::from_payload(
            Kind::Feature,
            &dataset(),
            payload(json!({"remote_id": null, "feature_type": "dwi"})),
        );
        assert!(matches!(result, Err(UploaderError::Serialization(_))));
    }

    #[test]
    fn test_key_includes_subtype() {
        let t1 = PendingRequest::from_payload(
            Kind::Acquisition,
            &dataset(),
            payload(json!({"remote_id": "sub-1", "acquisition_type": "T1w"})),
        )
        .unwrap();
        let dwi = PendingRequest::from_payload(
            Kind::Acquisition,
            &dataset(),
            payload(json!({"remote_id": "sub-1", "acquisition_type": "dMRI"})),
        )
        .unwrap();

        assert_ne!(t1.key(), dwi.key());
        assert_eq!(t1.key().to_string(), "WashU/acquisition/sub-1/T1w");
    }
}
