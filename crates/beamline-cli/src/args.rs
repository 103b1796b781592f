//! Command-line argument definitions for the Beamline CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments select the hardware description to read, where
//! the lattice listing goes, the mapping configuration, and log verbosity.

use clap::Parser;

/// Command-line arguments for the Beamline lattice generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the hardware description (TOML)
    #[arg(help = "Path to the hardware description file")]
    pub input: String,

    /// Path to the generated lattice listing
    #[arg(short, long, default_value = "lattice.txt")]
    pub output: String,

    /// Path to the element mapping configuration (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
