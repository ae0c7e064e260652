// phi-uploader - PhiDB neuroimaging record uploader
// Copyright (c) 2025 PhiDB Uploader Contributors
// Licensed under the MIT License

//! # phi-uploader
//!
//! Turns tabular descriptions of study participants, imaging acquisitions
//! and derived features into authenticated requests against the PhiDB REST
//! API, and keeps a ledger of what did not make it so a later run can retry
//! exactly those requests.
//!
//! ## Overview
//!
//! - **Reading** participant, acquisition and feature tables (CSV, TSV or spreadsheet)
//! - **Validating** every row before anything is written
//! - **Building** an ordered request batch and per-kind Postman collections
//! - **Uploading** with one login per run, classifying every response
//! - **Retrying** only the requests recorded as not uploaded
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Validation, building, session, upload, ledger and retry
//! - [`adapters`] - Tabular input and the PhiDB HTTP transport
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phi_uploader::config::UploaderConfig;
//! use phi_uploader::core::build::{run_build, BuildInputs, BuildOptions, CollectionTemplate};
//! use phi_uploader::core::layout::ApiLayout;
//! use phi_uploader::core::validate::ValidationContext;
//! use phi_uploader::domain::DatasetName;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let inputs = BuildInputs {
//!     patients: Some("participants.tsv".into()),
//!     ..Default::default()
//! };
//! let ctx = ValidationContext {
//!     default_dataset: Some(DatasetName::new("WashU")?),
//!     ..Default::default()
//! };
//!
//! let output = run_build(
//!     &inputs,
//!     &ctx,
//!     &ApiLayout::new("."),
//!     &CollectionTemplate::builtin(),
//!     &BuildOptions::default(),
//! )?;
//! println!("Built {} request(s)", output.batch.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fatal errors are [`domain::UploaderError`]s. Failures of individual
//! requests are not errors: they are recorded in the not_uploaded ledger
//! with an [`core::ledger::ErrorKind`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
