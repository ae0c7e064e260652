//! On-disk layout of build artifacts and upload bookkeeping
//!
//! ```text
//! <root>/API/
//!   <dataset>_add_<kind>_API.json
//!   not_uploaded/<dataset>_not_uploaded.json
//!   not_uploaded/<dataset>_<basename>_not_uploaded.tsv
//!   uploaded/<dataset>_<basename>_uploaded.tsv
//! ```

use crate::domain::{DatasetName, Kind, Result, UploaderError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const API_DIR: &str = "API";
const NOT_UPLOADED_DIR: &str = "not_uploaded";
const UPLOADED_DIR: &str = "uploaded";

/// Paths of every file the uploader reads or writes under a root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiLayout {
    root: PathBuf,
}

impl ApiLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn api_dir(&self) -> PathBuf {
        self.root.join(API_DIR)
    }

    pub fn not_uploaded_dir(&self) -> PathBuf {
        self.api_dir().join(NOT_UPLOADED_DIR)
    }

    pub fn uploaded_dir(&self) -> PathBuf {
        self.api_dir().join(UPLOADED_DIR)
    }

    /// Collection artifact for one kind
    pub fn collection_path(&self, dataset: &DatasetName, kind: Kind) -> PathBuf {
        self.api_dir()
            .join(format!("{dataset}_add_{}_API.json", kind.as_str()))
    }

    /// The not_uploaded ledger
    pub fn ledger_path(&self, dataset: &DatasetName) -> PathBuf {
        self.not_uploaded_dir()
            .join(format!("{dataset}_not_uploaded.json"))
    }

    pub fn not_uploaded_summary_path(&self, dataset: &DatasetName, kind: Kind) -> PathBuf {
        self.not_uploaded_dir().join(format!(
            "{dataset}_{}_not_uploaded.tsv",
            kind.summary_basename()
        ))
    }

    pub fn uploaded_summary_path(&self, dataset: &DatasetName, kind: Kind) -> PathBuf {
        self.uploaded_dir()
            .join(format!("{dataset}_{}_uploaded.tsv", kind.summary_basename()))
    }
}

/// Write `contents` to `path` through a temporary sibling and a rename
///
/// The temporary file is synced before the rename, so readers never observe
/// a partially written file, even after a crash.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        UploaderError::Io(format!("{} has no parent directory", path.display()))
    })?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp_path = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    if let Err(e) = write_synced(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(UploaderError::Io(format!(
            "Failed to write {}: {e}",
            tmp_path.display()
        )));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(UploaderError::Io(format!(
            "Failed to replace {}: {e}",
            path.display()
        )));
    }

    Ok(())
}

/// Write and flush `contents` to disk before the caller renames the file
fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
