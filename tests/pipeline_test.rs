//! Build pipeline tests: tables to batches and collections, and back

mod common;

use common::write_tsv;
use phi_uploader::core::build::{
    load_batch, run_build, BuildInputs, BuildOptions, CollectionTemplate,
};
use phi_uploader::core::layout::ApiLayout;
use phi_uploader::core::validate::ValidationContext;
use phi_uploader::domain::{DatasetName, Kind, UploaderError};
use tempfile::TempDir;

fn washu() -> DatasetName {
    DatasetName::new("WashU").unwrap()
}

fn context() -> ValidationContext {
    ValidationContext {
        default_dataset: Some(washu()),
        ..Default::default()
    }
}

fn inputs(dir: &TempDir) -> BuildInputs {
    let patients = write_tsv(
        dir.path(),
        "participants.tsv",
        &["participant_id", "sex", "education"],
        &[&["sub-01", "F", "12"], &["sub-02", "M", "16"]],
    );
    let acquisitions = write_tsv(
        dir.path(),
        "acquisitions.tsv",
        &["participant_id", "acquisition_type", "tesla_field"],
        &[&["sub-02", "T1w", "3"], &["sub-01", "dMRI", "3"]],
    );
    let features = write_tsv(
        dir.path(),
        "features.tsv",
        &["participant_id", "feature_type"],
        &[&["sub-01", "dwi"]],
    );
    BuildInputs {
        patients: Some(patients),
        acquisitions: Some(acquisitions),
        features: Some(features),
    }
}

#[test]
fn test_build_then_load_yields_the_same_batch() {
    let dir = TempDir::new().unwrap();
    let layout = ApiLayout::new(dir.path());

    let output = run_build(
        &inputs(&dir),
        &context(),
        &layout,
        &CollectionTemplate::builtin(),
        &BuildOptions::default(),
    )
    .unwrap();

    assert_eq!(output.batch.len(), 5);
    assert_eq!(output.written.len(), 3);
    for kind in Kind::ALL {
        assert!(layout.collection_path(&washu(), kind).exists());
    }

    let loaded = load_batch(&layout, &washu()).unwrap();
    assert_eq!(loaded, output.batch);
}

#[test]
fn test_patients_precede_their_dependents() {
    let dir = TempDir::new().unwrap();
    let output = run_build(
        &inputs(&dir),
        &context(),
        &ApiLayout::new(dir.path()),
        &CollectionTemplate::builtin(),
        &BuildOptions {
            online_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    let requests: Vec<_> = output.batch.iter().collect();
    for (index, request) in requests.iter().enumerate() {
        if let Some(patient) = &request.dependency {
            let patient_index = requests
                .iter()
                .position(|r| r.kind == Kind::Patient && &r.participant_id == patient)
                .expect("patient request present");
            assert!(patient_index < index);
        }
    }

    let kinds: Vec<Kind> = requests.iter().map(|r| r.kind).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
}

#[test]
fn test_online_only_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let layout = ApiLayout::new(dir.path());
    let output = run_build(
        &inputs(&dir),
        &context(),
        &layout,
        &CollectionTemplate::builtin(),
        &BuildOptions {
            online_only: true,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(output.batch.len(), 5);
    assert!(output.written.is_empty());
    assert!(!layout.api_dir().exists());
}

#[test]
fn test_n_test_zero_builds_an_empty_batch() {
    let dir = TempDir::new().unwrap();
    let layout = ApiLayout::new(dir.path());
    let output = run_build(
        &inputs(&dir),
        &context(),
        &layout,
        &CollectionTemplate::builtin(),
        &BuildOptions {
            n_test: Some(0),
            online_only: false,
        },
    )
    .unwrap();

    assert!(output.batch.is_empty());
    assert!(output.written.is_empty());
    for kind in Kind::ALL {
        assert!(!layout.collection_path(&washu(), kind).exists());
    }
}

#[test]
fn test_n_test_zero_keeps_previous_collections() {
    let dir = TempDir::new().unwrap();
    let layout = ApiLayout::new(dir.path());
    let template = CollectionTemplate::builtin();
    run_build(&inputs(&dir), &context(), &layout, &template, &BuildOptions::default()).unwrap();

    let output = run_build(
        &inputs(&dir),
        &context(),
        &layout,
        &template,
        &BuildOptions {
            n_test: Some(0),
            online_only: false,
        },
    )
    .unwrap();

    assert!(output.batch.is_empty());
    assert!(output.written.is_empty());
    for kind in Kind::ALL {
        assert!(layout.collection_path(&washu(), kind).exists());
    }
    assert_eq!(load_batch(&layout, &washu()).unwrap().len(), 5);
}

#[test]
fn test_n_test_keeps_first_records_of_each_kind() {
    let dir = TempDir::new().unwrap();
    let output = run_build(
        &inputs(&dir),
        &context(),
        &ApiLayout::new(dir.path()),
        &CollectionTemplate::builtin(),
        &BuildOptions {
            n_test: Some(1),
            online_only: true,
        },
    )
    .unwrap();

    let counts = output.batch.counts_by_kind();
    assert_eq!(counts[&Kind::Patient], 1);
    assert_eq!(counts[&Kind::Acquisition], 1);
    assert_eq!(counts[&Kind::Feature], 1);
    let patient = output.batch.of_kind(Kind::Patient).next().unwrap();
    assert_eq!(patient.participant_id.as_str(), "sub-01");
}

#[test]
fn test_rebuild_removes_collections_of_dropped_kinds() {
    let dir = TempDir::new().unwrap();
    let layout = ApiLayout::new(dir.path());
    let template = CollectionTemplate::builtin();

    run_build(&inputs(&dir), &context(), &layout, &template, &BuildOptions::default()).unwrap();

    let patients_only = BuildInputs {
        patients: inputs(&dir).patients,
        ..Default::default()
    };
    run_build(&patients_only, &context(), &layout, &template, &BuildOptions::default()).unwrap();

    assert!(layout.collection_path(&washu(), Kind::Patient).exists());
    assert!(!layout.collection_path(&washu(), Kind::Acquisition).exists());
    assert_eq!(load_batch(&layout, &washu()).unwrap().len(), 2);
}

#[test]
fn test_invalid_row_blocks_the_whole_build() {
    let dir = TempDir::new().unwrap();
    let layout = ApiLayout::new(dir.path());
    let mut bad = inputs(&dir);
    bad.features = Some(write_tsv(
        dir.path(),
        "features.tsv",
        &["participant_id", "feature_type"],
        &[&["sub-01", "dwi"], &["sub-02", "mesh"]],
    ));

    let err = run_build(
        &bad,
        &context(),
        &layout,
        &CollectionTemplate::builtin(),
        &BuildOptions::default(),
    )
    .unwrap_err();

    match err {
        UploaderError::Validation(report) => {
            assert_eq!(report.len(), 1);
            assert_eq!(report.errors[0].kind, Kind::Feature);
            assert_eq!(report.errors[0].participant_id, "sub-02");
            assert_eq!(report.errors[0].line, 3);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(!layout.api_dir().exists());
}

#[test]
fn test_spreadsheet_input_builds_like_a_table() {
    let dir = TempDir::new().unwrap();
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("participants.xlsx");

    let output = run_build(
        &BuildInputs {
            patients: Some(fixture),
            ..Default::default()
        },
        &context(),
        &ApiLayout::new(dir.path()),
        &CollectionTemplate::builtin(),
        &BuildOptions::default(),
    )
    .unwrap();

    let patients: Vec<_> = output.batch.of_kind(Kind::Patient).collect();
    assert_eq!(patients.len(), 2);
    assert_eq!(patients[0].participant_id.as_str(), "sub-01");
    assert_eq!(patients[0].payload["education"], serde_json::json!(12));
    assert_eq!(patients[1].payload["education"], serde_json::Value::Null);
}
