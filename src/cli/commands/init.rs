//! Init command implementation
//!
//! Writes a sample `phi-uploader.toml`.

use crate::config::DEFAULT_CONFIG_FILE;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub output: String,

    /// Include every setting with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing uploader configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Set api.email in {}", self.output);
                println!("  2. Put PHI_UPLOADER_API_PASSWORD in a .env file, or enter it when prompted");
                println!("  3. Build the collections:");
                println!("     phi-uploader build --patient participants.tsv --dataset WashU");
                println!("  4. Upload them: phi-uploader run --skip-build --dataset WashU");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# PhiDB uploader configuration

[application]
log_level = "info"

[api]
base_url = "https://phidb.pnc.unipd.it/api/v1"
email = "someone@example.org"
password = "${PHI_UPLOADER_API_PASSWORD}"

[build]
root = "."
dataset = "WashU"

[upload]
patient_duplicate_policy = "uploaded"
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# PhiDB uploader configuration
#
# Every setting is optional. Command-line flags override this file, and
# PHI_UPLOADER_<SECTION>_<KEY> environment variables override both the file
# and its ${VAR} references.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# PhiDB API
# ============================================================================
[api]
# API root; endpoints below are resolved against it
base_url = "https://phidb.pnc.unipd.it/api/v1"

# Account used for the single sign-in of a run
email = "someone@example.org"

# Password (use an environment variable, or leave unset to be prompted)
password = "${PHI_UPLOADER_API_PASSWORD}"

# TLS certificate verification
tls_verify = true

# Request and connect timeouts in seconds
timeout_seconds = 30
connect_timeout_seconds = 10

# Retries of connection failures, timeouts and HTTP 429
[api.retry]
max_retries = 3
initial_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# Endpoint paths relative to base_url
[api.endpoints]
sign_in = "auth/sign_in"
patient = "patients"
acquisition = "imaging_acquisitions"
feature = "features"

# ============================================================================
# Build
# ============================================================================
[build]
# Artifacts are written under <root>/API/
root = "."

# Postman collection template (built-in template when unset)
# template = "./phidb_template.json"

# Dataset for rows without a dataset column
dataset = "WashU"

# ============================================================================
# Vocabulary
# ============================================================================
[vocabulary]
acquisition_types = [
    "fMRI_rest", "perf", "T2w", "UTE", "DIXON", "hdeeg", "pet", "T1w",
    "T1w_pre", "lesion", "Flair", "T1w_wca", "dMRI", "fMRI_task", "TOF", "SWI",
]
feature_types = ["dwi", "anat", "lesion", "pet", "eeg", "func"]

# ============================================================================
# Upload
# ============================================================================
[upload]
# How a patient that already exists remotely is recorded:
#   uploaded     - counted as uploaded (rerunning an upload is harmless)
#   not_uploaded - kept in the not_uploaded ledger
patient_duplicate_policy = "uploaded"

# Response fragments of a 422 that mean "already exists"
duplicate_markers = ["already been taken", "already taken", "already exists"]

# Response fragments of a 422 that mean "participant not found"
missing_dependency_markers = ["must exist", "does not exist", "doesn't exist", "not found"]

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON log files next to console output
local_enabled = false
local_path = "./logs"

# Rotation (daily, hourly, never)
local_rotation = "daily"
"#
        .to_string()
    }
}
