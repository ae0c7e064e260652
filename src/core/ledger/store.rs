//! Ledger persistence
//!
//! The ledger JSON is the input of `run --retry-failed`; the TSV files are
//! human-readable summaries next to it.

use super::entry::{Ledger, LedgerEntry};
use crate::core::build::collection::pretty_json;
use crate::core::layout::{atomic_write, ApiLayout};
use crate::domain::{DatasetName, Kind, Result, UploaderError};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const NOT_UPLOADED_COLUMNS: &[&str] = &["error_kind", "http_status", "message", "attempted_at"];
const UPLOADED_COLUMNS: &[&str] = &["http_status", "attempted_at", "run_id"];

/// Reads and writes the ledger of a dataset
#[derive(Debug, Clone)]
pub struct LedgerStore {
    layout: ApiLayout,
}

impl LedgerStore {
    pub fn new(layout: ApiLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ApiLayout {
        &self.layout
    }

    /// Load the ledger, empty when none has been written yet
    pub fn load(&self, dataset: &DatasetName) -> Result<Ledger> {
        let path = self.layout.ledger_path(dataset);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No ledger yet");
            return Ok(Ledger::new(dataset.clone()));
        }

        let text = fs::read_to_string(&path)?;
        let ledger: Ledger = serde_json::from_str(&text).map_err(|e| {
            UploaderError::Ledger(format!("Corrupt ledger {}: {e}", path.display()))
        })?;

        if &ledger.dataset != dataset {
            return Err(UploaderError::Ledger(format!(
                "Ledger {} belongs to dataset '{}'",
                path.display(),
                ledger.dataset
            )));
        }

        tracing::debug!(path = %path.display(), entries = ledger.len(), "Loaded ledger");
        Ok(ledger)
    }

    /// Persist the ledger after a pass
    ///
    /// Rewrites the ledger JSON and the not_uploaded summaries, and appends
    /// the uploaded entries of `results` to the uploaded summaries.
    pub fn persist(&self, ledger: &Ledger, results: &[LedgerEntry]) -> Result<()> {
        let dataset = &ledger.dataset;
        let path = self.layout.ledger_path(dataset);
        atomic_write(&path, pretty_json(ledger)?.as_bytes())
            .map_err(|e| UploaderError::Ledger(format!("Failed to write ledger: {e}")))?;

        for kind in Kind::ALL {
            let summary = self.layout.not_uploaded_summary_path(dataset, kind);
            let remaining: Vec<&LedgerEntry> = ledger.of_kind(kind).collect();
            if remaining.is_empty() {
                if summary.exists() {
                    fs::remove_file(&summary)?;
                }
            } else {
                let table = summary_table(kind, &remaining, NOT_UPLOADED_COLUMNS);
                write_table(&summary, &table)?;
            }

            let uploaded: Vec<&LedgerEntry> = results
                .iter()
                .filter(|e| e.kind == kind && e.is_uploaded())
                .collect();
            if !uploaded.is_empty() {
                let path = self.layout.uploaded_summary_path(dataset, kind);
                append_table(&path, summary_table(kind, &uploaded, UPLOADED_COLUMNS))?;
            }
        }

        tracing::info!(
            path = %path.display(),
            remaining = ledger.len(),
            "Ledger persisted"
        );
        Ok(())
    }
}

/// Header and rows of a summary
#[derive(Debug, Clone, PartialEq, Eq)]
struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn summary_table(kind: Kind, entries: &[&LedgerEntry], extra: &[&str]) -> Table {
    let header: Vec<String> = kind
        .schema()
        .iter()
        .chain(extra.iter())
        .map(|c| c.to_string())
        .collect();

    let rows = entries
        .iter()
        .map(|entry| {
            let payload_cells = kind
                .schema()
                .iter()
                .map(|column| entry.payload.get(*column).map(cell_text).unwrap_or_default());
            let extra_cells = extra.iter().map(|column| match *column {
                "error_kind" => entry.error_kind.map(|k| k.to_string()).unwrap_or_default(),
                "http_status" => entry.http_status.map(|s| s.to_string()).unwrap_or_default(),
                "message" => entry.message.clone(),
                "attempted_at" => entry.attempted_at.to_rfc3339(),
                "run_id" => entry.run_id.to_string(),
                _ => String::new(),
            });
            payload_cells.chain(extra_cells).collect()
        })
        .collect();

    Table { header, rows }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_table(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| UploaderError::Io(format!("Failed to render {}: {e}", path.display())))?;
    atomic_write(path, &bytes)
}

fn read_table(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)?;
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;
    Ok(Table { header, rows })
}

/// Append `new` to the table at `path`, merging columns by name
fn append_table(path: &Path, new: Table) -> Result<()> {
    if !path.exists() {
        return write_table(path, &new);
    }

    let existing = match read_table(path) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable summary, rewriting it");
            return write_table(path, &new);
        }
    };

    let mut header = existing.header.clone();
    for column in &new.header {
        if !header.contains(column) {
            header.push(column.clone());
        }
    }

    let realign = |table: &Table| -> Vec<Vec<String>> {
        let index: HashMap<&str, usize> = table
            .header
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        table
            .rows
            .iter()
            .map(|row| {
                header
                    .iter()
                    .map(|column| {
                        index
                            .get(column.as_str())
                            .and_then(|&i| row.get(i))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    };

    let mut rows = realign(&existing);
    rows.extend(realign(&new));
    write_table(path, &Table { header, rows })
}
