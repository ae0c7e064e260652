//! Record kinds, raw rows and validated records

use crate::domain::errors::UploaderError;
use crate::domain::ids::{DatasetName, ParticipantId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const PATIENT_FIELDS: &[&str] = &[
    "disease_id",
    "center_id",
    "data_id",
    "remote_id",
    "dataset",
    "disease_notes",
    "education",
    "sex",
    "clinical",
    "behavioral",
];

const ACQUISITION_FIELDS: &[&str] = &[
    "remote_id",
    "acquisition_type",
    "general_comments",
    "head_coil",
    "tesla_field",
    "manufacturer",
    "machine",
    "resolution_acquis",
    "resolution_recon",
    "resolution_x",
    "resolution_y",
    "resolution_z",
    "time_repetition",
    "echo_time",
    "flip_angle",
    "bval",
    "bval_bin",
    "bvecs_num",
    "vol_num",
    "acquisition_plan",
    "injec_info",
];

const FEATURE_FIELDS: &[&str] = &["remote_id", "feature_type"];

/// Category of a tabular record and of the request it becomes
///
/// The declaration order is the upload precedence: every patient before
/// any acquisition, every acquisition before any feature.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Patient,
    Acquisition,
    Feature,
}

impl Kind {
    /// All kinds in upload precedence order
    pub const ALL: [Kind; 3] = [Kind::Patient, Kind::Acquisition, Kind::Feature];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Patient => "patient",
            Kind::Acquisition => "acquisition",
            Kind::Feature => "feature",
        }
    }

    /// Collection item name, e.g. `Add patient`
    pub fn item_name(&self) -> String {
        format!("Add {}", self.as_str())
    }

    /// Base name used for the tabular summaries
    pub fn summary_basename(&self) -> &'static str {
        match self {
            Kind::Patient => "participants",
            Kind::Acquisition => "acquisitions",
            Kind::Feature => "features",
        }
    }

    /// Payload column naming the record's subtype, if the kind has one
    pub fn subtype_field(&self) -> Option<&'static str> {
        match self {
            Kind::Patient => None,
            Kind::Acquisition => Some("acquisition_type"),
            Kind::Feature => Some("feature_type"),
        }
    }

    /// Payload columns sent to the API, in order
    pub fn schema(&self) -> &'static [&'static str] {
        match self {
            Kind::Patient => PATIENT_FIELDS,
            Kind::Acquisition => ACQUISITION_FIELDS,
            Kind::Feature => FEATURE_FIELDS,
        }
    }

    /// Whether the remote record requires the participant to exist first
    pub fn depends_on_patient(&self) -> bool {
        !matches!(self, Kind::Patient)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = UploaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" | "patients" | "participant" | "participants" => Ok(Kind::Patient),
            "acquisition" | "acquisitions" => Ok(Kind::Acquisition),
            "feature" | "features" => Ok(Kind::Feature),
            _ => Err(UploaderError::Other(format!(
                "Invalid record kind: {s}. Expected 'patient', 'acquisition' or 'feature'"
            ))),
        }
    }
}

/// A raw row as produced by the tabular reader
///
/// Cells are kept as text; typing happens during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    kind: Kind,
    line: u64,
    fields: BTreeMap<String, String>,
}

impl Row {
    pub fn new(kind: Kind, line: u64, fields: BTreeMap<String, String>) -> Self {
        Self { kind, line, fields }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn line(&self) -> u64 {
        self.line
    }

    /// Trimmed cell value, `None` when the column is absent or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.get("participant_id")
    }

    pub fn dataset(&self) -> Option<&str> {
        self.get("dataset")
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// A row that passed validation, with its request payload prepared
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub kind: Kind,
    pub participant_id: ParticipantId,
    pub dataset: DatasetName,
    /// acquisition_type / feature_type, `None` for patients
    pub subtype: Option<String>,
    pub payload: Map<String, Value>,
    pub line: u64,
}
