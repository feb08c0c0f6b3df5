//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::PollerConfig;
use crate::config::validation::{sanitize, validate_config, Correction, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, sanitize and validate configuration from a TOML file.
///
/// Returns the values that were replaced by defaults alongside the config;
/// the caller logs them once logging is up.
pub fn load_config(path: &Path) -> Result<(PollerConfig, Vec<Correction>), ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse, sanitize and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<(PollerConfig, Vec<Correction>), ConfigError> {
    let mut config: PollerConfig = toml::from_str(content)?;
    let corrections = sanitize(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok((config, corrections))
}
