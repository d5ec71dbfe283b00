//! vigil-daemon entry point.
//!
//! Loads configuration, initializes tracing, builds the log pipeline,
//! and runs until a termination signal arrives. Shutdown is graceful:
//! listeners close first, then each queue is drained downstream in order.
//! Exit code is 0 on graceful shutdown and non-zero on startup failure.

mod cli;
mod logging;

use anyhow::Result;
use clap::Parser;

use vigil_core::config::VigilConfig;
use vigil_core::error::ConfigError;
use vigil_core::pipeline::Pipeline;
use vigil_pipeline::{LogPipelineBuilder, PipelineConfig};

use crate::cli::DaemonCli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // Load configuration; a missing file falls back to built-in defaults.
    let mut config = match VigilConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(ConfigError::FileNotFound { .. }) => VigilConfig::default(),
        Err(e) => return Err(anyhow::anyhow!("failed to load config: {}", e)),
    };

    // CLI overrides take precedence over the config file.
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!("vigil-daemon starting");

    let pipeline_config = PipelineConfig::from_core(&config);
    let mut pipeline = LogPipelineBuilder::new()
        .config(pipeline_config)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

    pipeline
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

    tracing::info!(
        http = %pipeline.http_addr().map(|a| a.to_string()).unwrap_or_default(),
        tcp = %pipeline.tcp_addr().map(|a| a.to_string()).unwrap_or_default(),
        alerts = %pipeline.output_path(),
        "vigil is running; send SIGINT or SIGTERM to stop"
    );

    let signal = wait_for_shutdown_signal().await?;
    tracing::info!(signal = signal, "shutdown signal received");

    if let Err(e) = pipeline.stop().await {
        tracing::error!(error = %e, "failed to stop log pipeline");
    }

    tracing::info!("vigil-daemon shut down");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
