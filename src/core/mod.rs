//! Core business logic for the uploader.
//!
//! # Modules
//!
//! - [`validate`] - Row validation and payload normalization
//! - [`build`] - Request batches and collection artifacts
//! - [`session`] - The single authenticated session of a run
//! - [`upload`] - Ordered execution, response classification, summaries
//! - [`ledger`] - The not_uploaded ledger and its summaries
//! - [`retry`] - Resubmission of ledgered failures
//! - [`layout`] - Where artifacts live under the root directory
//!
//! # Upload Workflow
//!
//! 1. **Read**: Load the participant, acquisition and feature tables
//! 2. **Validate**: Reject the whole input if any row is invalid
//! 3. **Build**: Order requests patients first and write collections
//! 4. **Login**: Sign in once and keep the token for the run
//! 5. **Upload**: Send each request, classify the response
//! 6. **Persist**: Fold outcomes into the ledger and the TSV summaries
//!
//! # Example
//!
//! ```rust,no_run
//! use phi_uploader::adapters::phidb::HttpTransport;
//! use phi_uploader::config::{secret_string, UploaderConfig};
//! use phi_uploader::core::build::load_batch;
//! use phi_uploader::core::ledger::LedgerStore;
//! use phi_uploader::core::layout::ApiLayout;
//! use phi_uploader::core::session::SessionManager;
//! use phi_uploader::core::upload::UploadOrchestrator;
//! use phi_uploader::domain::DatasetName;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploaderConfig::default();
//! let layout = ApiLayout::new(".");
//! let dataset = DatasetName::new("WashU")?;
//!
//! let transport = Arc::new(HttpTransport::new(&config.api)?);
//! let session = SessionManager::new(transport.clone(), &config.api)?
//!     .login("me@example.org", &secret_string("password".to_string()))
//!     .await?;
//!
//! let orchestrator = UploadOrchestrator::new(
//!     transport,
//!     LedgerStore::new(layout.clone()),
//!     config.api.endpoints.clone(),
//!     config.upload.clone(),
//! );
//! let report = orchestrator.execute(load_batch(&layout, &dataset)?, &session).await?;
//!
//! println!("{}", report.summary);
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod layout;
pub mod ledger;
pub mod retry;
pub mod session;
pub mod upload;
pub mod validate;
