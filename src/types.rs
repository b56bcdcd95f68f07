// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of an event on the wire.
///
/// The set is closed on the producer side; consumers are expected to ignore
/// kinds they do not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Hello,
    Status,
    Stdout,
    Stderr,
    Error,
    Done,
}

/// Machine-readable reason attached to a terminal event.
///
/// A normal exit (successful or not) carries no reason at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    StartFailed,
    InvalidArgs,
    Timeout,
    Auth,
}

/// Output channel of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    pub fn kind(self) -> EventKind {
        match self {
            Channel::Stdout => EventKind::Stdout,
            Channel::Stderr => EventKind::Stderr,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stdout => f.write_str("stdout"),
            Channel::Stderr => f.write_str("stderr"),
        }
    }
}

/// Request action selected by the `action` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `run` and `run-stream` are aliases for the streaming supervisor.
    RunStream,
    ZipDir,
    TarDir,
    ChecksumFile,
    NetlifyDeployDir,
}

impl Action {
    /// Every wire name accepted in the `action` field.
    pub const NAMES: [&'static str; 6] = [
        "run",
        "run-stream",
        "zip-dir",
        "tar-dir",
        "checksum-file",
        "netlify-deploy-dir",
    ];
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "run" | "run-stream" => Ok(Action::RunStream),
            "zip-dir" => Ok(Action::ZipDir),
            "tar-dir" => Ok(Action::TarDir),
            "checksum-file" => Ok(Action::ChecksumFile),
            "netlify-deploy-dir" => Ok(Action::NetlifyDeployDir),
            other => Err(format!(
                "unknown action \"{other}\" (expected one of: {})",
                Action::NAMES.join(", ")
            )),
        }
    }
}
