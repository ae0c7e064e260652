//! Upload execution
//!
//! - [`classify`] - maps API responses to ledger outcomes
//! - [`orchestrator`] - issues a batch in order and keeps the ledger
//! - [`summary`] - per-pass counts and reporting

pub mod classify;
pub mod orchestrator;
pub mod summary;

pub use classify::{classify, Outcome};
pub use orchestrator::UploadOrchestrator;
pub use summary::{KindCounts, UploadReport, UploadSummary};
