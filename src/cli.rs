// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The request itself never comes from the command line; it is read as a
//! single JSON document from STDIN. Flags only tune the supervisor.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `opd-supervisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "opd-supervisor",
    version,
    about = "Run one command (or collaborator action) read as JSON from stdin and stream NDJSON events.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a TOML config file.
    ///
    /// Falls back to `OPD_SUPERVISOR_CONFIG`, then to built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OPD_SUPERVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Skip the `hello` handshake event (legacy callers).
    #[arg(long)]
    pub no_hello: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
