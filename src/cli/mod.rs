//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// phi-uploader - build and upload neuroimaging records to PhiDB
#[derive(Parser, Debug)]
#[command(name = "phi-uploader")]
#[command(version, about, long_about = None)]
#[command(author = "PhiDB Uploader Contributors")]
pub struct Cli {
    /// Path to configuration file (defaults to phi-uploader.toml when present)
    #[arg(short, long, env = "PHI_UPLOADER_CONFIG")]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PHI_UPLOADER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the input tables and write the upload collections
    Build(commands::build::BuildArgs),

    /// Build (or load) the requests and upload them
    Run(commands::run::RunArgs),

    /// Show the requests waiting to be uploaded
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Kind;
    use std::path::PathBuf;

    #[test]
    fn test_cli_parse_build() {
        let cli = Cli::parse_from([
            "phi-uploader",
            "build",
            "--patient",
            "participants.tsv",
            "--acquisition",
            "acquisitions.csv",
            "--dataset",
            "WashU",
            "--n-test",
            "5",
        ]);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.input.patient, Some(PathBuf::from("participants.tsv")));
                assert_eq!(args.input.dataset.unwrap().as_str(), "WashU");
                assert_eq!(args.input.n_test, Some(5));
                assert!(args.input.feature.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["phi-uploader", "--config", "custom.toml", "init"]);
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["phi-uploader", "--log-level", "debug", "init"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_run_flags() {
        let cli = Cli::parse_from([
            "phi-uploader",
            "run",
            "--skip-build",
            "--dataset",
            "WashU",
            "--email",
            "me@example.org",
            "--base-url",
            "http://localhost:3000/api/v1",
            "--behavioral",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.skip_build);
                assert!(!args.retry_failed);
                assert!(args.input.behavioral);
                assert_eq!(args.email.as_deref(), Some("me@example.org"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_conflicting_run_flags() {
        let result = Cli::try_parse_from(["phi-uploader", "run", "--skip-build", "--online-only"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_dataset() {
        let result = Cli::try_parse_from(["phi-uploader", "build", "--dataset", "a/b"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["phi-uploader", "status", "--kind", "acquisitions"]);
        match cli.command {
            Commands::Status(args) => assert_eq!(args.kind, Some(Kind::Acquisition)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["phi-uploader", "init"]);
        match cli.command {
            Commands::Init(args) => assert_eq!(args.output, "phi-uploader.toml"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
