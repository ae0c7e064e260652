//! Upload summary and reporting

use crate::core::ledger::{ErrorKind, LedgerEntry};
use crate::domain::Kind;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Per-kind counts of one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub uploaded: usize,
    pub not_uploaded: usize,
    /// Duplicates, whichever way they were ledgered
    pub duplicates: usize,
}

/// Summary of an upload pass
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub run_id: Uuid,

    /// Requests in the batch
    pub total_requests: usize,

    /// Counts per kind, for attempted requests
    pub by_kind: BTreeMap<Kind, KindCounts>,

    /// Requests skipped after an abort or interruption
    pub not_attempted: usize,

    /// Entries left in the not_uploaded ledger afterwards
    pub remaining: usize,

    /// Stopped by Ctrl+C or SIGTERM
    pub interrupted: bool,

    /// Stopped because the session token was refused
    pub auth_failure: bool,

    pub duration: Duration,

    /// Not-uploaded counts per error kind
    pub errors: BTreeMap<ErrorKind, usize>,
}

impl UploadSummary {
    pub fn new(run_id: Uuid, total_requests: usize) -> Self {
        Self {
            run_id,
            total_requests,
            by_kind: BTreeMap::new(),
            not_attempted: 0,
            remaining: 0,
            interrupted: false,
            auth_failure: false,
            duration: Duration::from_secs(0),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Count one ledger entry
    pub fn record(&mut self, entry: &LedgerEntry) {
        let counts = self.by_kind.entry(entry.kind).or_default();
        if entry.is_uploaded() {
            counts.uploaded += 1;
        } else {
            counts.not_uploaded += 1;
            if let Some(error_kind) = entry.error_kind {
                *self.errors.entry(error_kind).or_insert(0) += 1;
            }
        }
        if entry.error_kind == Some(ErrorKind::Duplicate) {
            counts.duplicates += 1;
        }
    }

    pub fn uploaded(&self) -> usize {
        self.by_kind.values().map(|c| c.uploaded).sum()
    }

    pub fn not_uploaded(&self) -> usize {
        self.by_kind.values().map(|c| c.not_uploaded).sum()
    }

    pub fn attempted(&self) -> usize {
        self.uploaded() + self.not_uploaded()
    }

    /// Failures other than benign duplicates
    pub fn hard_failures(&self) -> usize {
        self.errors
            .iter()
            .filter(|(kind, _)| **kind != ErrorKind::Duplicate)
            .map(|(_, count)| count)
            .sum()
    }

    /// Every attempted request uploaded or was a known duplicate
    pub fn is_successful(&self) -> bool {
        !self.interrupted && !self.auth_failure && self.not_attempted == 0 && self.hard_failures() == 0
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 100.0;
        }
        (self.uploaded() as f64 / attempted as f64) * 100.0
    }

    pub fn log_summary(&self) {
        for (kind, counts) in &self.by_kind {
            tracing::info!(
                kind = %kind,
                uploaded = counts.uploaded,
                not_uploaded = counts.not_uploaded,
                duplicates = counts.duplicates,
                "Upload results"
            );
        }

        tracing::info!(
            run_id = %self.run_id,
            total = self.total_requests,
            uploaded = self.uploaded(),
            not_uploaded = self.not_uploaded(),
            not_attempted = self.not_attempted,
            remaining = self.remaining,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Upload completed"
        );

        if self.interrupted {
            tracing::warn!(not_attempted = self.not_attempted, "Upload interrupted");
        }
        if self.auth_failure {
            tracing::error!(not_attempted = self.not_attempted, "Upload aborted, session refused");
        }
    }
}

impl fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Upload summary (run {})", self.run_id)?;
        for kind in Kind::ALL {
            let counts = self.by_kind.get(&kind).copied().unwrap_or_default();
            writeln!(
                f,
                "  {:<12} uploaded: {:>5}  not uploaded: {:>5}  duplicates: {:>5}",
                kind.summary_basename(),
                counts.uploaded,
                counts.not_uploaded,
                counts.duplicates
            )?;
        }
        for (error_kind, count) in &self.errors {
            writeln!(f, "  {error_kind}: {count}")?;
        }
        if self.not_attempted > 0 {
            writeln!(f, "  not attempted: {}", self.not_attempted)?;
        }
        write!(f, "  remaining in ledger: {}", self.remaining)
    }
}

/// Ledger entries and summary of a pass
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub entries: Vec<LedgerEntry>,
    pub summary: UploadSummary,
}

impl UploadReport {
    /// Report of a pass that had nothing to do
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            summary: UploadSummary::new(Uuid::new_v4(), 0),
        }
    }
}
