//! Beamline CLI entry point.

use std::{process::ExitCode, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use beamline_cli::{Args, CliError, error_adapter::to_reportables};

fn main() -> ExitCode {
    // Panics get the same miette rendering as lattice errors
    miette::set_panic_hook();

    let args = Args::parse();
    init_logger(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"); "Starting Beamline");
    debug!(args:?; "Parsed arguments");

    match beamline_cli::run(&args) {
        Ok(()) => {
            info!(output = args.output; "Completed successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

/// Installs `env_logger` at the requested level, falling back to `warn`.
fn init_logger(level: &str) {
    let log_level = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {level}. Using 'warn' instead.");
        LevelFilter::Warn
    });

    // Module directives from RUST_LOG still apply on top of the default level
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();
}

fn report(err: &CliError) {
    let reporter = miette::GraphicalReportHandler::new();

    for reportable in to_reportables(err) {
        let mut writer = String::new();
        match reporter.render_report(&mut writer, &reportable) {
            Ok(()) => error!("{writer}"),
            // Plain message if the graphical report cannot be rendered
            Err(_) => error!("{reportable}"),
        }
    }
}
