//! Configuration file discovery for the CLI.
//!
//! Looks for the element mapping configuration at an explicit path, then in
//! the local `beamline/` directory, then in the platform config directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use beamline::config::AppConfig;

use crate::CliError;

/// Configuration-related errors for CLI
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

/// Locations searched for the mapping configuration, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    /// `--config` on the command line.
    Explicit,
    /// `beamline/config.toml` under the working directory.
    Local,
    /// `config.toml` in the platform config directory.
    System,
}

impl ConfigSource {
    fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Local => "local",
            Self::System => "system",
        }
    }
}

/// Find and load the element mapping configuration.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. Local project directory (beamline/config.toml)
/// 3. Platform-specific config directory
/// 4. Built-in standard mapping if none found
///
/// # Errors
///
/// Returns error if:
/// - Explicit path is provided but file doesn't exist
/// - Config file exists but cannot be parsed
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, CliError> {
    match discover(explicit_path) {
        Some((source, path)) => {
            info!(
                source = source.as_str(),
                path = path.display().to_string();
                "Loading mapping configuration"
            );
            load_config_file(&path)
        }
        None => {
            debug!("No configuration file found, using the standard mapping");
            Ok(AppConfig::default())
        }
    }
}

/// Picks the configuration file to load, if any.
///
/// An explicit path is returned even when it does not exist, so that the
/// loader can report it as missing instead of silently falling back.
fn discover(explicit_path: Option<impl AsRef<Path>>) -> Option<(ConfigSource, PathBuf)> {
    if let Some(path) = explicit_path {
        return Some((ConfigSource::Explicit, path.as_ref().to_path_buf()));
    }

    let local_config = Path::new("beamline/config.toml");
    if local_config.exists() {
        return Some((ConfigSource::Local, local_config.to_path_buf()));
    }

    let Some(proj_dirs) = ProjectDirs::from("com", "beamline", "beamline") else {
        debug!("Could not determine platform-specific config directory");
        return None;
    };
    let system_config = proj_dirs.config_dir().join("config.toml");
    if system_config.exists() {
        return Some((ConfigSource::System, system_config));
    }

    debug!(path = system_config.display().to_string(); "System configuration file not found");
    None
}

fn load_config_file(path: &Path) -> Result<AppConfig, CliError> {
    // A missing file is a config error, not an I/O one
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;

    toml::from_str(&content).map_err(|e| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        }
        .into()
    })
}
