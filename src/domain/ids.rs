//! Domain identifier types with validation
//!
//! Newtype wrappers so participant identifiers and dataset names can't be
//! mixed up with each other or with free-form payload strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Participant identifier
///
/// The value of the `participant_id` column. The remote API knows it as
/// `remote_id`, and acquisitions/features use it as their dependency key.
///
/// # Examples
///
/// ```
/// use phi_uploader::domain::ids::ParticipantId;
/// use std::str::FromStr;
///
/// let id = ParticipantId::from_str("sub-001").unwrap();
/// assert_eq!(id.as_str(), "sub-001");
/// assert!(ParticipantId::new("  ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Creates a new ParticipantId, trimming surrounding whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Participant ID cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Dataset name
///
/// Used in artifact file names, so path separators are rejected.
///
/// # Examples
///
/// ```
/// use phi_uploader::domain::ids::DatasetName;
///
/// let dataset = DatasetName::new("WashU").unwrap();
/// assert_eq!(dataset.to_string(), "WashU");
/// assert!(DatasetName::new("../etc").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

impl DatasetName {
    /// Creates a new DatasetName
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err("Dataset name cannot be empty".to_string());
        }
        if trimmed.contains(['/', '\\']) || trimmed.contains("..") {
            return Err(format!(
                "Dataset name '{trimmed}' must not contain path separators"
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DatasetName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetName> for String {
    fn from(name: DatasetName) -> Self {
        name.0
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
