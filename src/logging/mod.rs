//! Logging and observability
//!
//! Structured logging with `tracing`:
//! - Configurable log levels
//! - Console output on stderr
//! - Optional JSON file logging with rotation
//!
//! # Example
//!
//! ```no_run
//! use phi_uploader::logging::init_logging;
//! use phi_uploader::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(dataset = "WashU", "Starting upload");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the outcome of one upload request
///
/// # Example
///
/// ```no_run
/// use phi_uploader::log_request_outcome;
///
/// log_request_outcome!(info, "patient", "sub-01", None::<&str>, 201, "Successful uploading");
/// ```
#[macro_export]
macro_rules! log_request_outcome {
    ($level:ident, $kind:expr, $participant:expr, $subtype:expr, $status:expr, $message:literal) => {
        tracing::$level!(
            kind = %$kind,
            remote_id = %$participant,
            subtype = ?$subtype,
            http_status = ?$status,
            $message
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use phi_uploader::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, 4000, "Connection refused");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_retries:expr, $delay_ms:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_retries = $max_retries,
            delay_ms = $delay_ms,
            reason = %$reason,
            "Retrying request"
        );
    };
}
