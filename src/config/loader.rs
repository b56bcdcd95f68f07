// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "OPD_SUPERVISOR_CONFIG";

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Pick the effective configuration for this invocation.
///
/// - An explicit `--config` path wins and must exist.
/// - Otherwise `OPD_SUPERVISOR_CONFIG`, if set and non-empty, must exist.
/// - Otherwise built-in defaults are used.
pub fn resolve_config(cli_path: Option<&Path>) -> Result<ConfigFile> {
    let from_env = std::env::var(CONFIG_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    match cli_path.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            debug!(path = ?path, "loading supervisor config");
            load_and_validate(path)
        }
        None => {
            let config = ConfigFile::default();
            validate_config(&config)?;
            Ok(config)
        }
    }
}
