// src/config/validate.rs

use crate::config::model::ConfigFile;
use crate::errors::{Result, SupervisorError};

/// Check the invariants serde cannot express.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_timing(cfg)?;
    validate_stream(cfg)?;
    validate_deploy(cfg)?;
    Ok(())
}

fn validate_timing(cfg: &ConfigFile) -> Result<()> {
    let timing = &cfg.timing;
    let intervals = [
        ("heartbeat_interval_ms", timing.heartbeat_interval_ms),
        ("idle_check_interval_ms", timing.idle_check_interval_ms),
    ];

    for (name, value) in intervals {
        if value == 0 {
            return Err(SupervisorError::ConfigError(format!(
                "[timing].{name} must be >= 1 (got 0)"
            )));
        }
    }

    Ok(())
}

fn validate_stream(cfg: &ConfigFile) -> Result<()> {
    if cfg.stream.max_line_bytes == 0 {
        return Err(SupervisorError::ConfigError(
            "[stream].max_line_bytes must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.stream.action_tag.trim().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[stream].action_tag must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_deploy(cfg: &ConfigFile) -> Result<()> {
    let deploy = &cfg.deploy;
    if deploy.api_base.trim().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[deploy].api_base must not be empty".to_string(),
        ));
    }
    if deploy.poll_attempts == 0 {
        return Err(SupervisorError::ConfigError(
            "[deploy].poll_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    if deploy.token_env.trim().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[deploy].token_env must not be empty".to_string(),
        ));
    }
    Ok(())
}
