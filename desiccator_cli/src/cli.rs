//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "desiccator", version, about = "Desiccator load cell and environment sampler")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/desiccator.toml")]
    pub config: PathBuf,

    /// Override the persisted calibration file from the config
    #[arg(long, value_name = "FILE")]
    pub calibration_file: Option<PathBuf>,

    /// Log and print records as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample masses and environment periodically until Ctrl-C
    Run {
        /// Stop after this many completed cycles
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        cycles: Option<u64>,
        /// Override [sampling].interval_ms
        #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },
    /// Capture the zero-load baseline of every load cell
    Tare {
        /// Samples averaged per cell (defaults to [mass].tare_samples)
        #[arg(long, value_name = "N")]
        samples: Option<usize>,
    },
    /// Interactively calibrate load cells against known masses and save the result
    Calibrate {
        /// Only calibrate this cell (e.g. 1L); otherwise every cell is offered in turn
        #[arg(long, value_name = "CELL")]
        cell: Option<String>,
    },
    /// Fit a cell from a CSV of `raw,mass` rows and save the result
    CalibrateCsv {
        /// Cell to calibrate (e.g. 3R)
        #[arg(long, value_name = "CELL")]
        cell: String,
        /// CSV file with strict `raw,mass` headers
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the load cells with their wiring and calibration
    Show,
    /// Quick health check: one raw reading per cell plus one environment read
    SelfCheck,
}
