// src/protocol/event.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{EventKind, Reason};

/// Open-ended, action-specific payload carried in `extra`.
pub type Extra = Map<String, Value>;

/// One line of the NDJSON event stream.
///
/// Optional fields are omitted from the encoding when unset, so a `stdout`
/// event is just `{"action":"opd","event":"stdout","data":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub action: String,

    pub event: EventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Extra>,
}

impl Event {
    pub fn new(action: impl Into<String>, event: EventKind) -> Self {
        Self {
            action: action.into(),
            event,
            data: None,
            ok: None,
            exit_code: None,
            is_final: None,
            error: None,
            reason: None,
            extra: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }

    /// True only for the single terminal `done` event of a stream.
    pub fn is_terminal(&self) -> bool {
        self.is_final == Some(true)
    }
}

/// Final result of one request, rendered as the terminal `done` event.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub ok: bool,
    pub exit_code: i32,
    pub reason: Option<Reason>,
    pub extra: Option<Extra>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            exit_code: 0,
            reason: None,
            extra: None,
        }
    }

    pub fn success_with(extra: Extra) -> Self {
        Self {
            extra: Some(extra),
            ..Self::success()
        }
    }

    /// Generic failure with exit code 1 and no reason.
    pub fn failure() -> Self {
        Self::failed_with(1, None)
    }

    pub fn failed_with(exit_code: i32, reason: Option<Reason>) -> Self {
        Self {
            ok: false,
            exit_code,
            reason,
            extra: None,
        }
    }

    /// Map an observed child exit to an outcome.
    ///
    /// `None` means the code was not obtainable (e.g. killed by a signal) and
    /// is reported as `1`.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::success(),
            Some(code) => Self::failed_with(code, None),
            None => Self::failure(),
        }
    }

    pub fn start_failed() -> Self {
        Self::failed_with(1, Some(Reason::StartFailed))
    }

    pub fn timed_out(exit_code: i32) -> Self {
        Self::failed_with(exit_code, Some(Reason::Timeout))
    }

    pub fn invalid_args() -> Self {
        Self::failed_with(1, Some(Reason::InvalidArgs))
    }

    pub fn auth() -> Self {
        Self::failed_with(1, Some(Reason::Auth))
    }

    /// Render as the terminal `done` event.
    pub fn to_event(&self, action: &str) -> Event {
        Event {
            ok: Some(self.ok),
            exit_code: Some(self.exit_code),
            is_final: Some(true),
            reason: self.reason,
            extra: self.extra.clone(),
            ..Event::new(action, EventKind::Done)
        }
    }
}
