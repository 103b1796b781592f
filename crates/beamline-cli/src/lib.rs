//! Beamline CLI library
//!
//! This module contains the core CLI logic for the Beamline lattice
//! generator.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;
pub use config::ConfigError;

use std::{fs, io, ops::Range};

use log::{info, warn};
use thiserror::Error;

use beamline::{LatticeError, ScenarioGenerator, hardware::HardwareNode};

/// Errors reported by the command-line tool.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid hardware description: {message}")]
    Hardware {
        message: String,
        src: String,
        span: Option<Range<usize>>,
    },

    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

/// Parse a hardware description from TOML source.
///
/// # Errors
///
/// Returns [`CliError::Hardware`] carrying the source and the offending span
/// when the document is not a valid hardware tree.
pub fn parse_hardware(source: &str) -> Result<HardwareNode, CliError> {
    toml::from_str(source).map_err(|err| CliError::Hardware {
        message: err.message().to_string(),
        src: source.to_string(),
        span: err.span(),
    })
}

/// Run the Beamline CLI application
///
/// This function reads the hardware description, generates its lattice and
/// writes the lattice listing to the output file.
///
/// # Arguments
///
/// * `args` - Command-line arguments
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed hardware descriptions
/// - Lattice generation errors
pub fn run(args: &Args) -> Result<(), CliError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing hardware description"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let source = fs::read_to_string(&args.input)?;
    let hardware = parse_hardware(&source)?;

    let generator = ScenarioGenerator::from_config(&app_config)?;
    let scenario = generator.generate_scenario(&hardware)?;

    for notice in scenario.notices() {
        warn!(kind = notice.kind().to_string(); "{notice}");
    }

    fs::write(&args.output, scenario.lattice().to_string())?;

    info!(
        output_file = args.output,
        elements = scenario.lattice().len();
        "Lattice exported successfully"
    );

    Ok(())
}
