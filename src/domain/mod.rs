//! Domain models and types for the uploader.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`ParticipantId`], [`DatasetName`])
//! - **Records** ([`Row`], [`ValidatedRecord`]) and their [`Kind`]
//! - **Requests** ([`PendingRequest`], [`RequestKey`])
//! - **Error types** ([`UploaderError`], [`ApiError`], [`ValidationError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! ```rust
//! use phi_uploader::domain::{DatasetName, ParticipantId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let participant = ParticipantId::new("sub-001")?;
//! let dataset = DatasetName::new("WashU")?;
//! // let wrong: ParticipantId = dataset;  // Compile error
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod request;
pub mod result;

pub use errors::{ApiError, UploaderError, ValidationError, ValidationReport, ValidationRule};
pub use ids::{DatasetName, ParticipantId};
pub use record::{Kind, Row, ValidatedRecord};
pub use request::{HttpMethod, PendingRequest, RequestKey};
pub use result::Result;
