// src/protocol/request.rs

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, SupervisorError};
use crate::types::Action;

/// Default PTY window when the request does not size it.
pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// The raw request document, exactly as read from STDIN.
///
/// `action` is the only required field. Everything else is optional and
/// interpreted by the selected action; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub action: String,

    #[serde(default)]
    pub cmd: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub timeout_sec: Option<i64>,
    #[serde(default)]
    pub idle_timeout_sec: Option<i64>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub pty: Option<bool>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub rows: Option<u16>,

    // Collaborator fields.
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub algo: Option<String>,
    #[serde(default)]
    pub targz: Option<bool>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub prod: Option<bool>,
}

impl Request {
    /// Resolve the `action` field.
    pub fn action(&self) -> Result<Action> {
        self.action
            .parse()
            .map_err(|_| SupervisorError::UnknownAction(self.action.clone()))
    }

    /// Project the request onto what the streaming supervisor needs.
    pub fn execution(&self) -> ExecutionRequest {
        ExecutionRequest {
            cmd: self.cmd.clone(),
            cwd: non_empty(self.cwd.as_deref()).map(PathBuf::from),
            timeout_sec: self.timeout_sec.unwrap_or(0),
            idle_timeout_sec: self.idle_timeout_sec.unwrap_or(0),
            env: self.env.clone(),
            transport: if self.pty.unwrap_or(false) {
                Transport::Pty {
                    cols: self.cols.filter(|c| *c > 0).unwrap_or(DEFAULT_COLS),
                    rows: self.rows.filter(|r| *r > 0).unwrap_or(DEFAULT_ROWS),
                }
            } else {
                Transport::Pipes
            },
        }
    }

    pub fn src(&self) -> Option<&str> {
        non_empty(self.src.as_deref())
    }

    pub fn dest(&self) -> Option<&str> {
        non_empty(self.dest.as_deref())
    }

    pub fn site(&self) -> Option<&str> {
        non_empty(self.site.as_deref())
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }
}

/// How the child's output descriptors are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Separate stdout / stderr pipes.
    Pipes,
    /// One pseudo-terminal carrying both streams.
    Pty { cols: u16, rows: u16 },
}

/// One command execution. Immutable once the supervisor starts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Shell command line; empty means "run the shell no-op".
    pub cmd: String,
    pub cwd: Option<PathBuf>,
    /// Hard wall-clock limit in seconds; `<= 0` disables it.
    pub timeout_sec: i64,
    /// Maximum silence in seconds; `<= 0` disables the idle watchdog.
    pub idle_timeout_sec: i64,
    pub env: Option<BTreeMap<String, String>>,
    pub transport: Transport,
}

impl ExecutionRequest {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: None,
            timeout_sec: 0,
            idle_timeout_sec: 0,
            env: None,
            transport: Transport::Pipes,
        }
    }

    pub fn hard_timeout(&self) -> Option<Duration> {
        positive_secs(self.timeout_sec)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        positive_secs(self.idle_timeout_sec)
    }

    /// Environment overrides with empty keys dropped.
    ///
    /// `None` means "inherit the environment unmodified".
    pub fn env_overrides(&self) -> Option<impl Iterator<Item = (&str, &str)>> {
        self.env.as_ref().map(|env| {
            env.iter()
                .filter(|(k, _)| !k.is_empty())
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
    }
}

fn positive_secs(secs: i64) -> Option<Duration> {
    u64::try_from(secs)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Read exactly one JSON request document from `reader`.
///
/// The document does not need to be followed by EOF; anything after the
/// first value is left unread.
pub fn read_request<R: Read>(reader: R) -> Result<Request> {
    let mut docs = serde_json::Deserializer::from_reader(reader).into_iter::<Request>();
    match docs.next() {
        Some(Ok(request)) => Ok(request),
        Some(Err(err)) => Err(SupervisorError::ProtocolError(err)),
        None => Err(SupervisorError::EmptyRequest),
    }
}
