//! CLI argument definitions for sqlsentinel-handler.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// SQL Server error-log alert handler.
///
/// Decodes one subscription event, extracts SQL Server errors, applies the
/// notification cooldown, and delivers alerts to the configured webhook.
/// The invocation result is printed to stdout as JSON.
#[derive(Parser, Debug)]
#[command(name = "sqlsentinel-handler")]
#[command(version, about, long_about = None)]
pub struct HandlerCli {
    /// Path to sqlsentinel.toml configuration file.
    ///
    /// When omitted, defaults and environment variables are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Inbound event JSON file, or `-` to read from stdin.
    #[arg(short, long, default_value = "-")]
    pub event: String,

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

    /// Validate configuration and exit without processing an event.
    #[arg(long)]
    pub validate: bool,
}

impl HandlerCli {
    /// Whether the event is read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.event == "-"
    }
}
