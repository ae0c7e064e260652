// phi-uploader - PhiDB neuroimaging record uploader
// Copyright (c) 2025 PhiDB Uploader Contributors
// Licensed under the MIT License

use phi_uploader::cli::{Cli, Commands};
use phi_uploader::config::{load_config_or_default, UploaderConfig};
use phi_uploader::logging::init_logging;
use clap::Parser;
use std::process;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config_or_default(cli.config.as_deref()) {
        Ok(c) => c,
        // init may replace a broken configuration file
        Err(_) if matches!(cli.command, Commands::Init(_)) => UploaderConfig::default(),
        Err(e) => {
            eprintln!("❌ Failed to load configuration");
            eprintln!("   Error: {e}");
            process::exit(2);
        }
    };

    let log_level = cli
        .log_level
        .as_deref()
        .unwrap_or(config.application.log_level.as_str());
    let logging_guard = match init_logging(log_level, &config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "phi-uploader - PhiDB neuroimaging record uploader"
    );

    // Shutdown signal, observed between requests
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::info!("Shutdown signal received, stopping after the current request");
        println!("\n⚠️  Shutdown signal received, finishing the current request...");
        let _ = shutdown_tx.send(true);
    });

    let exit_code = match execute_command(&cli, &config, shutdown_rx).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5 // Fatal error exit code
        }
    };

    // process::exit skips destructors; flush file logs first
    drop(logging_guard);
    process::exit(exit_code);
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl+C only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Execute the CLI command
async fn execute_command(
    cli: &Cli,
    config: &UploaderConfig,
    shutdown_signal: watch::Receiver<bool>,
) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Build(args) => args.execute(config).await,
        Commands::Run(args) => args.execute(config, shutdown_signal).await,
        Commands::Status(args) => args.execute(config).await,
        Commands::Init(args) => args.execute().await,
    }
}
