// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only failures that happen *before* the event stream is established end up
//! here. Anything after that point is reported in-stream as an `error` event
//! followed by a terminal `done`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid JSON request: {0}")]
    ProtocolError(#[from] serde_json::Error),

    #[error("invalid JSON request: no document on stdin")]
    EmptyRequest,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SupervisorError {
    /// Process exit status for a pre-stream failure.
    ///
    /// Malformed input and unknown actions use the reserved status `2`;
    /// everything else (config, local IO) exits with `1`.
    pub fn exit_status(&self) -> i32 {
        match self {
            SupervisorError::ProtocolError(_)
            | SupervisorError::EmptyRequest
            | SupervisorError::UnknownAction(_) => 2,
            _ => 1,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;
