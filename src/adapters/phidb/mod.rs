//! PhiDB REST API adapter
//!
//! - [`transport`] - the [`ApiTransport`] seam and its request/response types
//! - [`http`] - the reqwest implementation with transport-level retries

pub mod http;
pub mod transport;

pub use http::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, ApiTransport};
