//! CLI command implementations
//!
//! Every command returns a process exit code:
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | Success, including benign duplicates and no-ops |
//! | 1    | Some requests were not uploaded                 |
//! | 2    | Configuration, validation or input error        |
//! | 3    | Authentication failure                          |
//! | 4    | Connection failure                              |
//! | 5    | Other fatal error                               |
//! | 130  | Interrupted                                     |

pub mod build;
pub mod init;
pub mod run;
pub mod status;

use crate::config::UploaderConfig;
use crate::core::build::{BuildInputs, CollectionTemplate};
use crate::core::layout::ApiLayout;
use crate::core::validate::{ValidationContext, Vocabulary};
use crate::domain::{DatasetName, UploaderError};
use clap::Args;
use std::path::{Path, PathBuf};

/// Exit code for a fatal error
pub fn exit_code(error: &UploaderError) -> i32 {
    match error {
        UploaderError::Configuration(_)
        | UploaderError::Validation(_)
        | UploaderError::Input(_)
        | UploaderError::Template(_) => 2,
        UploaderError::Authentication(_) => 3,
        UploaderError::Api(_) => 4,
        UploaderError::Ledger(_)
        | UploaderError::Serialization(_)
        | UploaderError::Io(_)
        | UploaderError::Other(_) => 5,
    }
}

/// Print a fatal error the way every command does
pub(crate) fn report_error(headline: &str, error: &UploaderError) -> i32 {
    println!("❌ {headline}");
    match error {
        UploaderError::Validation(report) => {
            println!("   {} invalid row(s), nothing was built:", report.len());
            for row in &report.errors {
                println!("   - {row}");
            }
        }
        other => println!("   Error: {other}"),
    }
    exit_code(error)
}

/// Input tables and build settings shared by `build` and `run`
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Participants table (.csv or .tsv)
    #[arg(long, value_name = "PATH")]
    pub patient: Option<PathBuf>,

    /// Imaging acquisitions table (.csv or .tsv)
    #[arg(long, value_name = "PATH")]
    pub acquisition: Option<PathBuf>,

    /// Features table (.csv or .tsv)
    #[arg(long, value_name = "PATH")]
    pub feature: Option<PathBuf>,

    /// Dataset name, used for rows without one and in artifact file names
    #[arg(long)]
    pub dataset: Option<DatasetName>,

    /// Root directory; artifacts are written under <root>/API/
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Postman collection template (defaults to the built-in one)
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Keep only the first N records of each kind
    #[arg(long = "n-test", value_name = "N")]
    pub n_test: Option<usize>,

    /// Mark every patient as behavioral
    #[arg(long)]
    pub behavioral: bool,

    /// Mark every patient as clinical
    #[arg(long)]
    pub clinical: bool,
}

impl InputArgs {
    pub fn inputs(&self) -> BuildInputs {
        BuildInputs {
            patients: self.patient.clone(),
            acquisitions: self.acquisition.clone(),
            features: self.feature.clone(),
        }
    }

    /// Artifact layout, `--root` over `build.root`
    pub fn layout(&self, config: &UploaderConfig) -> ApiLayout {
        match &self.root {
            Some(root) => ApiLayout::new(root),
            None => ApiLayout::new(&config.build.root),
        }
    }

    /// Dataset of the run, `--dataset` over `build.dataset`
    pub fn dataset(&self, config: &UploaderConfig) -> Result<Option<DatasetName>, UploaderError> {
        if let Some(dataset) = &self.dataset {
            return Ok(Some(dataset.clone()));
        }
        config
            .build
            .dataset
            .as_deref()
            .map(|name| {
                DatasetName::new(name)
                    .map_err(|e| UploaderError::Configuration(format!("build.dataset: {e}")))
            })
            .transpose()
    }

    /// Collection template, `--template` over `build.template`
    pub fn template(&self, config: &UploaderConfig) -> Result<CollectionTemplate, UploaderError> {
        let path = self
            .template
            .as_deref()
            .or_else(|| config.build.template.as_deref().map(Path::new));
        CollectionTemplate::load_or_builtin(path)
    }

    pub fn validation_context(
        &self,
        config: &UploaderConfig,
    ) -> Result<ValidationContext, UploaderError> {
        Ok(ValidationContext {
            vocabulary: Vocabulary::from_config(&config.vocabulary),
            default_dataset: self.dataset(config)?,
            behavioral: self.behavioral,
            clinical: self.clinical,
        })
    }
}
