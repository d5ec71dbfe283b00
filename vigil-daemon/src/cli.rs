//! CLI argument definitions for vigil-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Vigil log-anomaly detection daemon.
///
/// Runs the streaming pipeline (ingest over HTTP/TCP, field extraction,
/// rule evaluation, alert output) and manages its lifecycle.
#[derive(Parser, Debug)]
#[command(name = "vigil-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to vigil.toml configuration file.
    ///
    /// If the file does not exist, built-in defaults are used.
    #[arg(short, long, default_value = "/etc/vigil/vigil.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
