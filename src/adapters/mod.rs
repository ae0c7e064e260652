//! External integrations
//!
//! - [`phidb`] - HTTP access to the PhiDB REST API
//! - [`tabular`] - CSV, TSV and spreadsheet input files

pub mod phidb;
pub mod tabular;

pub use phidb::{ApiRequest, ApiResponse, ApiTransport, HttpTransport};
pub use tabular::read_table;
