//! Domain error types
//!
//! This module defines the error hierarchy for the uploader. Errors are
//! domain-specific and don't expose third-party types.

use crate::domain::record::Kind;
use std::fmt;
use thiserror::Error;

/// Main uploader error type
///
/// Fatal errors only. Per-request failures during an upload pass are
/// recorded in the ledger instead of being raised.
#[derive(Debug, Error)]
pub enum UploaderError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One or more input rows failed validation
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// Tabular input could not be read
    #[error("Input error: {0}")]
    Input(String),

    /// Collection template could not be loaded or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote API transport errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Ledger persistence errors
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Transport-level errors talking to the PhiDB API
///
/// These errors don't expose the HTTP client's types.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failed to connect to the API server
    #[error("Failed to connect to API server: {0}")]
    ConnectionFailed(String),

    /// Request timed out
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Response could not be read or was malformed
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Rate limit still exceeded after the configured retries
    #[error("Rate limit exceeded after {0} attempt(s)")]
    RateLimited(usize),
}

/// The rule a row violated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationRule {
    /// A field required for the row's kind is missing or blank
    MissingField(&'static str),
    /// The acquisition type is not in the vocabulary
    UnknownAcquisitionType(String),
    /// The feature type is not in the vocabulary
    UnknownFeatureType(String),
    /// Neither the row nor the run supplies a dataset name
    EmptyDataset,
    /// The dataset name can't be used in artifact file names
    InvalidDataset(String),
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "required field '{field}' is missing"),
            Self::UnknownAcquisitionType(t) => write!(f, "invalid acquisition type '{t}'"),
            Self::UnknownFeatureType(t) => write!(f, "invalid feature type '{t}'"),
            Self::EmptyDataset => write!(f, "dataset name is empty"),
            Self::InvalidDataset(reason) => write!(f, "invalid dataset name: {reason}"),
        }
    }
}

/// A single row-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Kind of the offending row
    pub kind: Kind,
    /// Line of the row in its source file (1-based, header is line 1)
    pub line: u64,
    /// Participant identifier of the row, empty when it is the missing field
    pub participant_id: String,
    /// The first rule the row violated
    pub rule: ValidationRule,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let participant = if self.participant_id.is_empty() {
            "<missing>"
        } else {
            self.participant_id.as_str()
        };
        write!(
            f,
            "{} row at line {} (participant {}): {}",
            self.kind, self.line, participant, self.rule
        )
    }
}

/// All validation failures collected across an input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid row(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl From<std::io::Error> for UploaderError {
    fn from(err: std::io::Error) -> Self {
        UploaderError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for UploaderError {
    fn from(err: serde_json::Error) -> Self {
        UploaderError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for UploaderError {
    fn from(err: toml::de::Error) -> Self {
        UploaderError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for UploaderError {
    fn from(err: csv::Error) -> Self {
        UploaderError::Input(err.to_string())
    }
}
