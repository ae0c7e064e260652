//! Upload ledger
//!
//! The ledger records every request that is still to be uploaded, with the
//! payload needed to retry it. The upload orchestrator is its only writer.

pub mod entry;
pub mod store;

pub use entry::{ErrorKind, Ledger, LedgerEntry, UploadStatus};
pub use store::LedgerStore;
