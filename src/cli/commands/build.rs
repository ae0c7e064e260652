//! Build command implementation
//!
//! Validates the input tables and writes the per-kind collections under
//! `<root>/API/` without contacting the API.

use super::{report_error, InputArgs};
use crate::config::UploaderConfig;
use crate::core::build::{run_build, BuildOptions, BuildOutput};
use crate::domain::Result;
use clap::Args;

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

impl BuildArgs {
    /// Execute the build command
    pub async fn execute(&self, config: &UploaderConfig) -> anyhow::Result<i32> {
        tracing::info!("Building upload collections");

        println!("🔨 Building upload collections");
        println!();

        let output = match build_requests(&self.input, config, false) {
            Ok(output) => output,
            Err(e) => return Ok(report_error("Build failed", &e)),
        };

        print_build(&output);
        Ok(0)
    }
}

/// Read, validate and build the requests described by `input`
pub(crate) fn build_requests(
    input: &InputArgs,
    config: &UploaderConfig,
    online_only: bool,
) -> Result<BuildOutput> {
    let ctx = input.validation_context(config)?;
    let template = input.template(config)?;
    let options = BuildOptions {
        n_test: input.n_test,
        online_only,
    };
    run_build(&input.inputs(), &ctx, &input.layout(config), &template, &options)
}

pub(crate) fn print_build(output: &BuildOutput) {
    let batch = &output.batch;
    if batch.is_empty() {
        println!("✅ Nothing to build for dataset {}", batch.dataset());
        return;
    }

    println!("✅ Built {} request(s) for dataset {}", batch.len(), batch.dataset());
    for (kind, count) in batch.counts_by_kind() {
        println!("   {kind}: {count}");
    }
    if !output.written.is_empty() {
        println!();
        println!("Collections:");
        for path in &output.written {
            println!("   {}", path.display());
        }
    }
    println!();
}
