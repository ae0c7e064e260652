//! Run command implementation
//!
//! Builds (or loads) the request batch, signs in once and uploads every
//! request in order, keeping the not_uploaded ledger current.

use super::build::{build_requests, print_build};
use super::{exit_code, report_error, InputArgs};
use crate::adapters::phidb::{ApiTransport, HttpTransport};
use crate::config::{secret_string, SecretString, UploaderConfig};
use crate::core::build::{load_batch, RequestBatch};
use crate::core::ledger::{Ledger, LedgerStore};
use crate::core::retry::RetryController;
use crate::core::session::SessionManager;
use crate::core::upload::{UploadOrchestrator, UploadReport};
use crate::domain::{DatasetName, UploaderError};
use clap::Args;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Account email (overrides api.email)
    #[arg(long)]
    pub email: Option<String>,

    /// Account password (overrides api.password, prompted when absent)
    #[arg(long)]
    pub password: Option<String>,

    /// API root (overrides api.base_url)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Upload the collections written by a previous build
    #[arg(long)]
    pub skip_build: bool,

    /// Build in memory without writing collections
    #[arg(long, conflicts_with = "skip_build")]
    pub online_only: bool,

    /// Resubmit the requests recorded as not uploaded
    #[arg(long, conflicts_with = "online_only")]
    pub retry_failed: bool,
}

/// What a run sends
enum Plan {
    Upload(RequestBatch),
    Retry(Ledger),
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config: &UploaderConfig,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(
            skip_build = self.skip_build,
            online_only = self.online_only,
            retry_failed = self.retry_failed,
            "Starting run"
        );

        println!("🚀 Uploading to PhiDB");
        println!();

        let config = match self.apply_overrides(config) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let layout = self.input.layout(&config);
        let plan = match self.plan(&config, LedgerStore::new(layout.clone())) {
            Ok(plan) => plan,
            Err(e) => return Ok(report_error("Failed to prepare requests", &e)),
        };

        let pending = match &plan {
            Plan::Upload(batch) => batch.len(),
            Plan::Retry(ledger) => ledger.len(),
        };
        if pending == 0 {
            println!("✅ Nothing to upload");
            return Ok(0);
        }

        let transport: Arc<dyn ApiTransport> = match HttpTransport::new(&config.api) {
            Ok(t) => Arc::new(t),
            Err(e) => return Ok(report_error("Failed to create HTTP client", &e)),
        };

        let (email, password) = match credentials(&config) {
            Ok(c) => c,
            Err(e) => return Ok(report_error("Missing credentials", &e)),
        };

        println!("🔐 Signing in as {email}");
        let session = match SessionManager::new(transport.clone(), &config.api) {
            Ok(manager) => match manager.login(&email, &password).await {
                Ok(session) => session,
                Err(e) => return Ok(report_error("Login failed", &e)),
            },
            Err(e) => return Ok(report_error("Login failed", &e)),
        };
        println!("✅ Signed in");
        println!();

        let orchestrator = UploadOrchestrator::new(
            transport,
            LedgerStore::new(layout),
            config.api.endpoints.clone(),
            config.upload.clone(),
        )
        .with_shutdown(shutdown_signal);

        println!("📤 Uploading {pending} request(s)");
        let result = match plan {
            Plan::Upload(batch) => orchestrator.execute(batch, &session).await,
            Plan::Retry(ledger) => RetryController::new(&orchestrator).retry(&ledger, &session).await,
        };

        match result {
            Ok(report) => Ok(print_report(&report)),
            Err(e) => {
                tracing::error!(error = %e, "Upload failed");
                Ok(report_error("Upload failed", &e))
            }
        }
    }

    /// Configuration with the command-line overrides applied, validated
    fn apply_overrides(&self, config: &UploaderConfig) -> Result<UploaderConfig, String> {
        let mut config = config.clone();
        if let Some(base_url) = &self.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(email) = &self.email {
            config.api.email = Some(email.clone());
        }
        if let Some(password) = &self.password {
            config.api.password = Some(secret_string(password.clone()));
        }
        config.validate()?;
        Ok(config)
    }

    fn plan(&self, config: &UploaderConfig, store: LedgerStore) -> Result<Plan, UploaderError> {
        if self.retry_failed {
            let dataset = required_dataset(&self.input, config, "--retry-failed")?;
            let ledger = store.load(&dataset)?;
            if ledger.is_empty() {
                tracing::info!(dataset = %dataset, "Ledger is empty, nothing to retry");
            } else {
                println!("🔁 {} request(s) to retry for dataset {dataset}", ledger.len());
            }
            return Ok(Plan::Retry(ledger));
        }

        if self.skip_build {
            let dataset = required_dataset(&self.input, config, "--skip-build")?;
            let batch = load_batch(store.layout(), &dataset)?;
            println!("📂 Loaded {} request(s) from collections", batch.len());
            return Ok(Plan::Upload(batch));
        }

        let output = build_requests(&self.input, config, self.online_only)?;
        print_build(&output);
        Ok(Plan::Upload(output.batch))
    }
}

fn required_dataset(
    input: &InputArgs,
    config: &UploaderConfig,
    flag: &str,
) -> Result<DatasetName, UploaderError> {
    input.dataset(config)?.ok_or_else(|| {
        UploaderError::Configuration(format!(
            "{flag} needs a dataset name; pass --dataset or set build.dataset"
        ))
    })
}

/// Email and password of the run, prompting for the password when unset
fn credentials(config: &UploaderConfig) -> Result<(String, SecretString), UploaderError> {
    let email = config
        .api
        .email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            UploaderError::Configuration(
                "No account email; pass --email or set api.email".to_string(),
            )
        })?;

    let password = match &config.api.password {
        Some(password) if !password.expose_secret().is_empty() => password.clone(),
        _ => {
            let typed = rpassword::prompt_password(format!("Password for {email}: ")).map_err(
                |e| UploaderError::Authentication(format!("Failed to read password: {e}")),
            )?;
            secret_string(typed)
        }
    };

    Ok((email, password))
}

/// Print the pass summary and pick the exit code
fn print_report(report: &UploadReport) -> i32 {
    let summary = &report.summary;
    println!();
    println!("{summary}");
    println!();

    if summary.interrupted {
        println!("⚠️  Upload interrupted, {} request(s) not attempted", summary.not_attempted);
        println!("   Run again with --retry-failed or rerun the upload");
        return 130;
    }
    if summary.auth_failure {
        println!("❌ Session refused mid-upload, {} request(s) not attempted", summary.not_attempted);
        return exit_code(&UploaderError::Authentication(String::new()));
    }
    if summary.hard_failures() > 0 {
        println!(
            "⚠️  {} request(s) not uploaded, see the not_uploaded ledger",
            summary.hard_failures()
        );
        println!("   Retry with: phi-uploader run --retry-failed --dataset <name>");
        return 1;
    }

    println!(
        "✅ Upload completed ({:.2}% uploaded)",
        summary.success_rate()
    );
    0
}
