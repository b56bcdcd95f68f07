// src/engine/mod.rs

//! Request lifecycle engine.
//!
//! The pure outcome state machine lives in [`reporter`]; the async/IO shell
//! that launches the child, runs the timers and races completion against the
//! deadline is implemented in [`supervisor`].

use std::time::Duration;

use crate::config::ConfigFile;

pub mod reporter;
pub mod supervisor;

pub use reporter::{OutcomeReporter, RequestState, Resolution};
pub use supervisor::Supervisor;

/// Timing and stream knobs used by the supervisor for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub heartbeat_interval: Duration,
    pub idle_check_interval: Duration,
    pub kill_grace: Duration,
    pub drain_timeout: Duration,
    pub max_line_bytes: usize,
    pub timeout_exit_code: i32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&ConfigFile::default())
    }
}

impl From<&ConfigFile> for SupervisorSettings {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            heartbeat_interval: cfg.timing.heartbeat_interval(),
            idle_check_interval: cfg.timing.idle_check_interval(),
            kill_grace: cfg.timing.kill_grace(),
            drain_timeout: cfg.timing.drain_timeout(),
            max_line_bytes: cfg.stream.max_line_bytes,
            timeout_exit_code: cfg.timing.timeout_exit_code,
        }
    }
}
