//! Configuration management for the uploader.
//!
//! # Overview
//!
//! Configuration comes from an optional TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `PHI_UPLOADER_*` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! Command-line flags are applied on top by the CLI layer.
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`ApiConfig`] - API root, credentials, timeouts, retries, endpoints
//! - [`BuildConfig`] - Root directory, template, default dataset
//! - [`VocabularyConfig`] - Allowed acquisition and feature types
//! - [`UploadConfig`] - Duplicate policy and response markers
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "https://phidb.pnc.unipd.it/api/v1"
//! email = "someone@unipd.it"
//! password = "${PHIDB_PASSWORD}"
//!
//! [build]
//! root = "./Clinical_connectome/UNIPD"
//! dataset = "WashU"
//!
//! [upload]
//! patient_duplicate_policy = "uploaded"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_or_default, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApiConfig, ApplicationConfig, BuildConfig, DuplicatePolicy, EndpointsConfig, LoggingConfig,
    RetryConfig, UploadConfig, UploaderConfig, VocabularyConfig, DEFAULT_BASE_URL,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
