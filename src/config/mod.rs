//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path specified via the `CONFIG_FILE` CLI argument (must exist)
//! 2. Default location:
//!    - **Linux/macOS:** `~/.prompthub-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.prompthub-mcp\config.json`
//!
//! Unlike an explicit path, an absent default file is not an error: the
//! server starts with built-in defaults so a bare install works.

mod settings;

pub use settings::{Config, DiscoveryConfig, LoggingConfig};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.prompthub-mcp/`
/// - **Windows:** `%USERPROFILE%\.prompthub-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".prompthub-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Returns the default user-tier resource root.
#[must_use]
pub fn default_user_dir() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("resources"))
}

/// Returns the default persisted-state file path.
#[must_use]
pub fn default_state_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("state.json"))
}

/// Loads and parses the configuration file.
///
/// An explicit `path` must exist. With no path, the default location is
/// used if present, otherwise built-in defaults apply.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly requested file does not exist
/// - The file cannot be read
/// - The JSON is malformed
/// - Validation fails
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                tracing::debug!("No configuration file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}
