mod app;
mod cli;
mod error_fmt;
mod operator;

use clap::Parser;
use desiccator_config::Logging;
use eyre::{Result, WrapErr};
use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        tracing::error!(error = %format!("{err:#}"), "command failed");
        if json {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = app::load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    let rig = app::build_rig(&cfg, cli.calibration_file.as_deref())?;
    match cli.cmd {
        Commands::Run {
            cycles,
            interval_ms,
        } => app::run_sampling(&cfg, rig, cycles, interval_ms, cli.json),
        Commands::Tare { samples } => app::tare(&cfg, rig, samples, cli.json),
        Commands::Calibrate { cell } => app::calibrate(rig, cell.as_deref()),
        Commands::CalibrateCsv { cell, file } => app::calibrate_csv(rig, &cell, &file),
        Commands::Show => app::show(&rig, cli.json),
        Commands::SelfCheck => app::self_check(rig),
    }
}

/// Console logs go to stderr (pretty or JSON); `[logging].file` adds a JSON-lines file.
fn init_tracing(json: bool, cli_level: Option<&str>, logging: &Logging) -> Result<()> {
    let level = cli_level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) if cli_level.is_none() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(level).wrap_err_with(|| format!("invalid log level {level:?}"))?,
    };

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).with_target(false).boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_writer(writer).with_ansi(false).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("initialize logging")?;
    Ok(())
}
