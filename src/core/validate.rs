//! Row validation and payload normalization
//!
//! Every row is checked against the required-field rules of its kind and
//! the configured vocabularies. Rows that pass become [`ValidatedRecord`]s
//! whose payload is restricted to the kind's columns and typed the way the
//! remote API expects.

use crate::config::VocabularyConfig;
use crate::domain::{
    DatasetName, Kind, ParticipantId, Result, Row, UploaderError, ValidatedRecord,
    ValidationError, ValidationReport, ValidationRule,
};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

/// Columns sent as strings even when they look numeric
const IDENTIFIER_COLUMNS: &[&str] = &[
    "participant_id",
    "remote_id",
    "data_id",
    "dataset",
    "acquisition_type",
    "feature_type",
];

/// Cell spellings read as missing values
const NULL_MARKERS: &[&str] = &[
    "nan", "-nan", "na", "n/a", "#n/a", "null", "none", "<na>",
];

/// Allowed acquisition and feature types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    acquisition_types: BTreeSet<String>,
    feature_types: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new(
        acquisition_types: impl IntoIterator<Item = String>,
        feature_types: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            acquisition_types: acquisition_types.into_iter().collect(),
            feature_types: feature_types.into_iter().collect(),
        }
    }

    pub fn from_config(config: &VocabularyConfig) -> Self {
        Self::new(
            config.acquisition_types.iter().cloned(),
            config.feature_types.iter().cloned(),
        )
    }

    pub fn allows(&self, kind: Kind, subtype: &str) -> bool {
        match kind {
            Kind::Patient => true,
            Kind::Acquisition => self.acquisition_types.contains(subtype),
            Kind::Feature => self.feature_types.contains(subtype),
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::from_config(&VocabularyConfig::default())
    }
}

/// Run-wide settings that influence validation
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    pub vocabulary: Vocabulary,
    /// Dataset used for rows without a `dataset` column
    pub default_dataset: Option<DatasetName>,
    /// Force `behavioral = true` on every patient
    pub behavioral: bool,
    /// Force `clinical = true` on every patient
    pub clinical: bool,
}

/// Validate one row
///
/// Checks run in a fixed order and stop at the first violation: participant
/// id, subtype column, vocabulary membership, dataset.
pub fn validate(row: &Row, ctx: &ValidationContext) -> std::result::Result<ValidatedRecord, ValidationError> {
    let kind = row.kind();
    let fail = |participant_id: &str, rule: ValidationRule| ValidationError {
        kind,
        line: row.line(),
        participant_id: participant_id.to_string(),
        rule,
    };

    let participant_id = row
        .participant_id()
        .and_then(|id| ParticipantId::new(id).ok())
        .ok_or_else(|| fail("", ValidationRule::MissingField("participant_id")))?;

    let subtype = match kind.subtype_field() {
        Some(field) => {
            let value = row
                .get(field)
                .ok_or_else(|| fail(participant_id.as_str(), ValidationRule::MissingField(field)))?;
            if !ctx.vocabulary.allows(kind, value) {
                let rule = match kind {
                    Kind::Feature => ValidationRule::UnknownFeatureType(value.to_string()),
                    _ => ValidationRule::UnknownAcquisitionType(value.to_string()),
                };
                return Err(fail(participant_id.as_str(), rule));
            }
            Some(value.to_string())
        }
        None => None,
    };

    let dataset = match row.dataset() {
        Some(name) => DatasetName::new(name)
            .map_err(|reason| fail(participant_id.as_str(), ValidationRule::InvalidDataset(reason)))?,
        None => ctx
            .default_dataset
            .clone()
            .ok_or_else(|| fail(participant_id.as_str(), ValidationRule::EmptyDataset))?,
    };

    let payload = normalize_payload(row, &participant_id, &dataset, ctx);

    Ok(ValidatedRecord {
        kind,
        participant_id,
        dataset,
        subtype,
        payload,
        line: row.line(),
    })
}

/// Validate every row, collecting all failures
///
/// # Errors
///
/// Returns [`UploaderError::Validation`] listing every invalid row when at
/// least one row fails.
pub fn validate_all(rows: &[Row], ctx: &ValidationContext) -> Result<Vec<ValidatedRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    let mut report = ValidationReport::default();

    for row in rows {
        match validate(row, ctx) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(
                    kind = %error.kind,
                    line = error.line,
                    participant_id = %error.participant_id,
                    rule = %error.rule,
                    "Invalid row"
                );
                report.errors.push(error);
            }
        }
    }

    if !report.is_empty() {
        return Err(UploaderError::Validation(report));
    }

    tracing::debug!(records = records.len(), "All rows valid");
    Ok(records)
}

fn normalize_payload(
    row: &Row,
    participant_id: &ParticipantId,
    dataset: &DatasetName,
    ctx: &ValidationContext,
) -> Map<String, Value> {
    let kind = row.kind();
    let mut payload = Map::new();

    for &column in kind.schema() {
        let value = match row.get(column) {
            Some(cell) if IDENTIFIER_COLUMNS.contains(&column) => identifier_cell(cell),
            Some(cell) => typed_cell(cell),
            None => Value::Null,
        };
        payload.insert(column.to_string(), value);
    }

    let id = Value::String(participant_id.to_string());
    payload.insert("remote_id".to_string(), id.clone());

    if kind == Kind::Patient {
        payload.insert("data_id".to_string(), id);
        payload.insert("dataset".to_string(), Value::String(dataset.to_string()));
        if ctx.behavioral {
            payload.insert("behavioral".to_string(), Value::Bool(true));
        }
        if ctx.clinical {
            payload.insert("clinical".to_string(), Value::Bool(true));
        }
    }

    payload
}

fn is_null_marker(cell: &str) -> bool {
    cell.is_empty() || NULL_MARKERS.contains(&cell.to_lowercase().as_str())
}

fn identifier_cell(cell: &str) -> Value {
    if is_null_marker(cell) {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

/// Type a cell: missing markers become null, then bool, integer, float, string
pub fn typed_cell(cell: &str) -> Value {
    let cell = cell.trim();
    if is_null_marker(cell) {
        return Value::Null;
    }
    if cell.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if cell.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use test_case::test_case;

    fn row(kind: Kind, cells: &[(&str, &str)]) -> Row {
        let fields: BTreeMap<String, String> = cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Row::new(kind, 2, fields)
    }

    fn ctx() -> ValidationContext {
        ValidationContext {
            default_dataset: Some(DatasetName::new("WashU").unwrap()),
            ..Default::default()
        }
    }

    #[test_case("" => Value::Null ; "empty")]
    #[test_case("NaN" => Value::Null ; "nan")]
    #[test_case("n/a" => Value::Null ; "not available")]
    #[test_case("True" => json!(true) ; "boolean")]
    #[test_case("12" => json!(12) ; "integer")]
    #[test_case("3.0" => json!(3.0) ; "float")]
    #[test_case("Siemens" => json!("Siemens") ; "text")]
    #[test_case("inf" => json!("inf") ; "non finite stays text")]
    fn test_typed_cell(cell: &str) -> Value {
        typed_cell(cell)
    }

    #[test]
    fn test_valid_patient_payload() {
        let r = row(
            Kind::Patient,
            &[("participant_id", "007"), ("sex", "F"), ("education", "12"), ("extra", "x")],
        );
        let record = validate(&r, &ctx()).unwrap();

        assert_eq!(record.participant_id.as_str(), "007");
        assert_eq!(record.dataset.as_str(), "WashU");
        assert!(record.subtype.is_none());
        assert_eq!(record.payload["remote_id"], json!("007"));
        assert_eq!(record.payload["data_id"], json!("007"));
        assert_eq!(record.payload["dataset"], json!("WashU"));
        assert_eq!(record.payload["education"], json!(12));
        assert_eq!(record.payload["disease_id"], Value::Null);
        assert!(!record.payload.contains_key("extra"));
        assert!(!record.payload.contains_key("participant_id"));
        assert_eq!(record.payload.len(), Kind::Patient.schema().len());
    }

    #[test]
    fn test_flags_force_patient_fields() {
        let ctx = ValidationContext {
            behavioral: true,
            clinical: true,
            ..ctx()
        };
        let r = row(Kind::Patient, &[("participant_id", "sub-1"), ("clinical", "false")]);
        let record = validate(&r, &ctx).unwrap();

        assert_eq!(record.payload["behavioral"], json!(true));
        assert_eq!(record.payload["clinical"], json!(true));
    }

    #[test]
    fn test_acquisition_subtype() {
        let r = row(
            Kind::Acquisition,
            &[("participant_id", "sub-1"), ("acquisition_type", "T1w"), ("tesla_field", "3")],
        );
        let record = validate(&r, &ctx()).unwrap();

        assert_eq!(record.subtype.as_deref(), Some("T1w"));
        assert_eq!(record.payload["acquisition_type"], json!("T1w"));
        assert_eq!(record.payload["tesla_field"], json!(3));
        assert!(!record.payload.contains_key("data_id"));
    }

    #[test_case(Kind::Patient, &[("sex", "F")] => ValidationRule::MissingField("participant_id") ; "missing participant")]
    #[test_case(Kind::Acquisition, &[("participant_id", "sub-1")] => ValidationRule::MissingField("acquisition_type") ; "missing acquisition type")]
    #[test_case(Kind::Feature, &[("participant_id", "sub-1"), ("feature_type", " ")] => ValidationRule::MissingField("feature_type") ; "blank feature type")]
    #[test_case(Kind::Acquisition, &[("participant_id", "sub-1"), ("acquisition_type", "T3w")] => ValidationRule::UnknownAcquisitionType("T3w".to_string()) ; "unknown acquisition type")]
    #[test_case(Kind::Feature, &[("participant_id", "sub-1"), ("feature_type", "mesh")] => ValidationRule::UnknownFeatureType("mesh".to_string()) ; "unknown feature type")]
    #[test_case(Kind::Patient, &[("participant_id", "sub-1"), ("dataset", "../x")] => matches ValidationRule::InvalidDataset(_) ; "dataset with separators")]
    fn test_validation_rules(kind: Kind, cells: &[(&str, &str)]) -> ValidationRule {
        validate(&row(kind, cells), &ctx()).unwrap_err().rule
    }

    #[test]
    fn test_missing_dataset_without_default() {
        let r = row(Kind::Patient, &[("participant_id", "sub-1")]);
        let err = validate(&r, &ValidationContext::default()).unwrap_err();
        assert_eq!(err.rule, ValidationRule::EmptyDataset);
        assert_eq!(err.participant_id, "sub-1");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_row_dataset_overrides_default() {
        let r = row(Kind::Patient, &[("participant_id", "sub-1"), ("dataset", "HCP")]);
        let record = validate(&r, &ctx()).unwrap();
        assert_eq!(record.dataset.as_str(), "HCP");
        assert_eq!(record.payload["dataset"], json!("HCP"));
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let rows = vec![
            row(Kind::Patient, &[("participant_id", "sub-1")]),
            row(Kind::Patient, &[("sex", "M")]),
            row(Kind::Feature, &[("participant_id", "sub-1"), ("feature_type", "mesh")]),
        ];

        match validate_all(&rows, &ctx()) {
            Err(UploaderError::Validation(report)) => assert_eq!(report.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_vocabulary_from_config() {
        let vocabulary = Vocabulary::new(vec!["T1w".to_string()], vec!["dwi".to_string()]);
        assert!(vocabulary.allows(Kind::Acquisition, "T1w"));
        assert!(!vocabulary.allows(Kind::Acquisition, "t1w"));
        assert!(vocabulary.allows(Kind::Feature, "dwi"));
        assert!(vocabulary.allows(Kind::Patient, "anything"));
    }
}
