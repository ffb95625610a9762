// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The daemon is configured entirely on the command line; there is no config
//! file. `--help` exits 0 and unrecognised flags exit nonzero, both handled
//! by clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `watchdogd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "watchdogd",
    version,
    about = "Stroke the hardware watchdog while the checks in the test directory keep passing.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory containing the health-check executables.
    #[arg(short = 'e', long, value_name = "PATH", default_value = "/etc/watchdog.d")]
    pub test_dir: PathBuf,

    /// Set the watchdog counter to this many seconds.
    #[arg(short = 'w', long, value_name = "SECS", default_value_t = 90)]
    pub watchdog_timeout: u32,

    /// Keepalive interval in seconds (default: watchdog-timeout / 2 - 3).
    #[arg(short = 'k', long, value_name = "SECS")]
    pub keepalive: Option<u32>,

    /// Disable the watchdog when the daemon exits.
    #[arg(short = 'd', long)]
    pub disable_on_exit: bool,

    /// Watchdog device node.
    #[arg(long, value_name = "PATH", default_value = "/dev/watchdog")]
    pub device: PathBuf,

    /// Run without watchdog hardware; stroke decisions are only logged.
    #[arg(long)]
    pub no_watchdog: bool,

    /// Run a single round of checks and exit.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WATCHDOGD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Effective keepalive interval in seconds.
    ///
    /// When not given explicitly this derives from the watchdog timeout so
    /// that a missed round still leaves headroom inside the hardware
    /// countdown.
    pub fn keepalive_secs(&self) -> u32 {
        self.keepalive
            .unwrap_or_else(|| (self.watchdog_timeout / 2).saturating_sub(3))
    }
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
