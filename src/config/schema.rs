//! Configuration schema types
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration; the CLI supplies the rest.

use crate::config::SecretString;
use crate::domain::Kind;
use serde::{Deserialize, Serialize};

/// Default PhiDB API root
pub const DEFAULT_BASE_URL: &str = "https://phidb.pnc.unipd.it/api/v1";

/// Main uploader configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploaderConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Remote API connection and authentication
    #[serde(default)]
    pub api: ApiConfig,

    /// Collection building defaults
    #[serde(default)]
    pub build: BuildConfig,

    /// Allowed acquisition and feature types
    #[serde(default)]
    pub vocabulary: VocabularyConfig,

    /// Response classification policy
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl UploaderConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.api.validate()?;
        self.vocabulary.validate()?;
        self.upload.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Retry configuration for connection-level failures and 429 responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_ms(&self, attempt: usize) -> u64 {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        (delay as u64).min(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Endpoint paths relative to `api.base_url`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_sign_in_endpoint")]
    pub sign_in: String,

    #[serde(default = "default_patient_endpoint")]
    pub patient: String,

    #[serde(default = "default_acquisition_endpoint")]
    pub acquisition: String,

    #[serde(default = "default_feature_endpoint")]
    pub feature: String,
}

impl EndpointsConfig {
    pub fn for_kind(&self, kind: Kind) -> &str {
        match kind {
            Kind::Patient => &self.patient,
            Kind::Acquisition => &self.acquisition,
            Kind::Feature => &self.feature,
        }
    }

    fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("sign_in", &self.sign_in),
            ("patient", &self.patient),
            ("acquisition", &self.acquisition),
            ("feature", &self.feature),
        ] {
            if value.trim_matches('/').is_empty() {
                return Err(format!("api.endpoints.{name} cannot be empty"));
            }
        }
        Ok(())
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            sign_in: default_sign_in_endpoint(),
            patient: default_patient_endpoint(),
            acquisition: default_acquisition_endpoint(),
            feature: default_feature_endpoint(),
        }
    }
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root URL of the API, e.g. `https://phidb.pnc.unipd.it/api/v1`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Login email (can be given on the command line instead)
    #[serde(default)]
    pub email: Option<String>,

    /// Login password
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// TLS certificate verification enabled
    ///
    /// Only disable against a development server with a self-signed
    /// certificate.
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Endpoint paths
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

impl ApiConfig {
    fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| format!("api.base_url '{}' is not a valid URL: {e}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "api.base_url must start with http:// or https://, got {}",
                self.base_url
            ));
        }

        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(format!("api.email '{email}' is not an email address"));
            }
        }

        if self.timeout_seconds == 0 || self.timeout_seconds > 600 {
            return Err(format!(
                "api.timeout_seconds must be between 1 and 600, got {}",
                self.timeout_seconds
            ));
        }

        if self.connect_timeout_seconds == 0 {
            return Err("api.connect_timeout_seconds must be greater than 0".to_string());
        }

        if self.retry.max_retries > 10 {
            return Err(format!(
                "api.retry.max_retries must be <= 10, got {}",
                self.retry.max_retries
            ));
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(format!(
                "api.retry.backoff_multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            ));
        }

        self.endpoints.validate()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            email: None,
            password: None,
            tls_verify: true,
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            retry: RetryConfig::default(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

/// Defaults for the `build` command and the build step of `run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Root directory; artifacts go to `<root>/API`
    #[serde(default = "default_root")]
    pub root: String,

    /// Collection template file (built-in template when unset)
    #[serde(default)]
    pub template: Option<String>,

    /// Dataset name used when `--dataset` is not given
    #[serde(default)]
    pub dataset: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            template: None,
            dataset: None,
        }
    }
}

/// Closed sets of allowed acquisition and feature types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    #[serde(default = "default_acquisition_types")]
    pub acquisition_types: Vec<String>,

    #[serde(default = "default_feature_types")]
    pub feature_types: Vec<String>,
}

impl VocabularyConfig {
    fn validate(&self) -> Result<(), String> {
        if self.acquisition_types.is_empty() {
            return Err("vocabulary.acquisition_types cannot be empty".to_string());
        }
        if self.feature_types.is_empty() {
            return Err("vocabulary.feature_types cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            acquisition_types: default_acquisition_types(),
            feature_types: default_feature_types(),
        }
    }
}

/// How a patient "already taken" response is ledgered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The patient exists remotely, count it as uploaded
    #[default]
    Uploaded,
    /// Keep it in the not_uploaded ledger for review
    NotUploaded,
}

/// Response classification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub patient_duplicate_policy: DuplicatePolicy,

    /// Case-insensitive 422 body fragments meaning "already exists"
    #[serde(default = "default_duplicate_markers")]
    pub duplicate_markers: Vec<String>,

    /// Case-insensitive 422 body fragments meaning "participant missing"
    #[serde(default = "default_missing_dependency_markers")]
    pub missing_dependency_markers: Vec<String>,
}

impl UploadConfig {
    fn validate(&self) -> Result<(), String> {
        if self.duplicate_markers.iter().all(|m| m.trim().is_empty()) {
            return Err("upload.duplicate_markers cannot be empty".to_string());
        }
        if self
            .missing_dependency_markers
            .iter()
            .all(|m| m.trim().is_empty())
        {
            return Err("upload.missing_dependency_markers cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            patient_duplicate_policy: DuplicatePolicy::default(),
            duplicate_markers: default_duplicate_markers(),
            missing_dependency_markers: default_missing_dependency_markers(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to rotating files
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Rotation (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err(
                "logging.local_path cannot be empty when local logging is enabled".to_string(),
            );
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_sign_in_endpoint() -> String {
    "auth/sign_in".to_string()
}

fn default_patient_endpoint() -> String {
    "patients".to_string()
}

fn default_acquisition_endpoint() -> String {
    "imaging_acquisitions".to_string()
}

fn default_feature_endpoint() -> String {
    "features".to_string()
}

fn default_root() -> String {
    ".".to_string()
}

fn default_acquisition_types() -> Vec<String> {
    [
        "fMRI_rest",
        "perf",
        "T2w",
        "UTE",
        "DIXON",
        "hdeeg",
        "pet",
        "T1w",
        "T1w_pre",
        "lesion",
        "Flair",
        "T1w_wca",
        "dMRI",
        "fMRI_task",
        "TOF",
        "SWI",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_feature_types() -> Vec<String> {
    ["dwi", "anat", "lesion", "pet", "eeg", "func"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_duplicate_markers() -> Vec<String> {
    vec![
        "already been taken".to_string(),
        "already taken".to_string(),
        "already exists".to_string(),
    ]
}

fn default_missing_dependency_markers() -> Vec<String> {
    vec![
        "must exist".to_string(),
        "does not exist".to_string(),
        "doesn't exist".to_string(),
        "not found".to_string(),
    ]
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
