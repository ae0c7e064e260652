//! Status command implementation
//!
//! Prints the not_uploaded ledger of a dataset.

use super::report_error;
use crate::config::UploaderConfig;
use crate::core::layout::ApiLayout;
use crate::core::ledger::{ErrorKind, Ledger, LedgerEntry, LedgerStore};
use crate::domain::{DatasetName, Kind, UploaderError};
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Arguments for the status command
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Dataset whose ledger to show (defaults to build.dataset)
    #[arg(long)]
    pub dataset: Option<DatasetName>,

    /// Root directory holding API/ (defaults to build.root)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Only show entries of this kind (patient, acquisition, feature)
    #[arg(long)]
    pub kind: Option<Kind>,

    /// Print the ledger as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config: &UploaderConfig) -> anyhow::Result<i32> {
        tracing::info!("Checking upload status");

        let dataset = match self.dataset(config) {
            Ok(d) => d,
            Err(e) => return Ok(report_error("No dataset to inspect", &e)),
        };

        let layout = match &self.root {
            Some(root) => ApiLayout::new(root),
            None => ApiLayout::new(&config.build.root),
        };
        let ledger = match LedgerStore::new(layout).load(&dataset) {
            Ok(l) => l,
            Err(e) => return Ok(report_error("Failed to load the ledger", &e)),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ledger)?);
            return Ok(0);
        }

        println!("📊 Upload Status: {dataset}");
        println!();

        if ledger.is_empty() {
            println!("No requests waiting to be uploaded.");
            return Ok(0);
        }

        let entries: Vec<&LedgerEntry> = ledger
            .entries
            .iter()
            .filter(|e| self.kind.map_or(true, |kind| e.kind == kind))
            .collect();

        if entries.is_empty() {
            println!("No ledger entries match the specified filters.");
            return Ok(0);
        }

        print_counts(&ledger);
        println!();
        println!(
            "{:<12} {:<20} {:<12} {:<18} {:<6} {:<20} Message",
            "Kind", "Participant", "Subtype", "Error", "HTTP", "Attempted"
        );
        println!("{}", "-".repeat(120));

        for entry in entries {
            println!(
                "{:<12} {:<20} {:<12} {:<18} {:<6} {:<20} {}",
                entry.kind.as_str(),
                entry.participant_id.as_str(),
                entry.subtype.as_deref().unwrap_or("-"),
                entry.error_kind.map(|k| k.as_str()).unwrap_or("-"),
                entry
                    .http_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                entry.attempted_at.format("%Y-%m-%d %H:%M:%S"),
                entry.message
            );
        }

        println!();
        println!("Retry with: phi-uploader run --retry-failed --dataset {dataset}");
        Ok(0)
    }

    fn dataset(&self, config: &UploaderConfig) -> Result<DatasetName, UploaderError> {
        if let Some(dataset) = &self.dataset {
            return Ok(dataset.clone());
        }
        let name = config.build.dataset.as_deref().ok_or_else(|| {
            UploaderError::Configuration("Pass --dataset or set build.dataset".to_string())
        })?;
        DatasetName::new(name).map_err(|e| UploaderError::Configuration(format!("build.dataset: {e}")))
    }
}

/// Not-uploaded counts per kind and per error kind
fn counts(ledger: &Ledger) -> (BTreeMap<Kind, usize>, BTreeMap<ErrorKind, usize>) {
    let mut by_kind = BTreeMap::new();
    let mut by_error = BTreeMap::new();
    for entry in ledger.not_uploaded() {
        *by_kind.entry(entry.kind).or_insert(0) += 1;
        if let Some(error_kind) = entry.error_kind {
            *by_error.entry(error_kind).or_insert(0) += 1;
        }
    }
    (by_kind, by_error)
}

fn print_counts(ledger: &Ledger) {
    let (by_kind, by_error) = counts(ledger);
    println!("Not uploaded: {}", ledger.len());
    for (kind, count) in by_kind {
        println!("  {:<14} {count}", kind.summary_basename());
    }
    for (error_kind, count) in by_error {
        println!("  {:<14} {count}", error_kind.as_str());
    }
    if let Some(updated_at) = ledger.updated_at {
        println!("Last updated: {}", updated_at.format("%Y-%m-%d %H:%M:%S"));
    }
}
