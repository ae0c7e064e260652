//! Request building
//!
//! Turns tabular inputs into an ordered [`RequestBatch`] and, unless running
//! online-only, into collection artifacts under `<root>/API/`.

pub mod batch;
pub mod collection;

pub use batch::RequestBatch;
pub use collection::{load_batch, write_collections, CollectionTemplate};

use crate::adapters::tabular::read_table;
use crate::core::layout::ApiLayout;
use crate::core::validate::{validate_all, ValidationContext};
use crate::domain::{DatasetName, Kind, PendingRequest, Result, Row, UploaderError, ValidatedRecord};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Input tables, one optional file per kind
#[derive(Debug, Clone, Default)]
pub struct BuildInputs {
    pub patients: Option<PathBuf>,
    pub acquisitions: Option<PathBuf>,
    pub features: Option<PathBuf>,
}

impl BuildInputs {
    fn tables(&self) -> impl Iterator<Item = (Kind, &PathBuf)> {
        [
            (Kind::Patient, self.patients.as_ref()),
            (Kind::Acquisition, self.acquisitions.as_ref()),
            (Kind::Feature, self.features.as_ref()),
        ]
        .into_iter()
        .filter_map(|(kind, path)| path.map(|p| (kind, p)))
    }

    pub fn is_empty(&self) -> bool {
        self.tables().next().is_none()
    }
}

/// Options of a build
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Keep only the first N records of each kind
    pub n_test: Option<usize>,
    /// Build the batch without writing collections
    pub online_only: bool,
}

/// Result of a build
#[derive(Debug)]
pub struct BuildOutput {
    pub batch: RequestBatch,
    /// Collections written, empty when online-only
    pub written: Vec<PathBuf>,
}

/// Read every input table
pub fn read_inputs(inputs: &BuildInputs) -> Result<Vec<Row>> {
    if inputs.is_empty() {
        return Err(UploaderError::Input(
            "No input tables given; pass at least one of --patient, --acquisition, --feature"
                .to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (kind, path) in inputs.tables() {
        rows.extend(read_table(path, kind)?);
    }
    Ok(rows)
}

/// Dataset of the run: the explicit one, else the one all records share
pub fn resolve_dataset(
    explicit: Option<&DatasetName>,
    records: &[ValidatedRecord],
) -> Result<DatasetName> {
    if let Some(dataset) = explicit {
        return Ok(dataset.clone());
    }

    let datasets: BTreeSet<&DatasetName> = records.iter().map(|r| &r.dataset).collect();
    let mut iter = datasets.into_iter();
    match (iter.next(), iter.next()) {
        (Some(dataset), None) => Ok(dataset.clone()),
        (None, _) => Err(UploaderError::Configuration(
            "No dataset name; pass --dataset or set build.dataset".to_string(),
        )),
        (Some(first), Some(second)) => Err(UploaderError::Configuration(format!(
            "Input spans several datasets ('{first}', '{second}', ...); pass --dataset"
        ))),
    }
}

/// Build the ordered batch of `records`
///
/// `n_test` truncates each kind to its first N records; zero yields an empty
/// batch.
pub fn build(records: Vec<ValidatedRecord>, dataset: &DatasetName, n_test: Option<usize>) -> RequestBatch {
    let mut requests = Vec::with_capacity(records.len());
    for kind in Kind::ALL {
        let of_kind = records.iter().filter(|r| r.kind == kind);
        let limit = n_test.unwrap_or(usize::MAX);
        requests.extend(
            of_kind
                .take(limit)
                .cloned()
                .map(|record| PendingRequest::from_record(record, dataset)),
        );
    }

    if let Some(n) = n_test {
        tracing::info!(n_test = n, requests = requests.len(), "Test build, truncated each kind");
    }

    RequestBatch::new(dataset.clone(), requests)
}

/// Read, validate and build, then write collections unless online-only
///
/// Nothing is written when any row fails validation, and `n-test 0` leaves
/// the collections of a previous build in place.
pub fn run_build(
    inputs: &BuildInputs,
    ctx: &ValidationContext,
    layout: &ApiLayout,
    template: &CollectionTemplate,
    options: &BuildOptions,
) -> Result<BuildOutput> {
    let rows = read_inputs(inputs)?;
    let records = validate_all(&rows, ctx)?;
    let dataset = resolve_dataset(ctx.default_dataset.as_ref(), &records)?;
    let batch = build(records, &dataset, options.n_test);

    for (kind, count) in batch.counts_by_kind() {
        tracing::info!(dataset = %dataset, kind = %kind, requests = count, "Built requests");
    }

    let written = if options.online_only {
        tracing::info!("Online-only build, no collections written");
        Vec::new()
    } else if options.n_test == Some(0) {
        tracing::info!("n-test 0, existing collections left untouched");
        Vec::new()
    } else {
        write_collections(layout, &batch, template)?
    };

    Ok(BuildOutput { batch, written })
}
