// src/engine/reporter.rs

//! Pure outcome state machine.
//!
//! `running` moves to exactly one of `completed`, `timed-out` or
//! `start-failed`; every state but `running` is terminal. The first
//! [`Resolution`] wins and yields the [`Outcome`] to report; every later one
//! is ignored. No Tokio, no IO: the supervisor feeds it whatever its race
//! produced.

use crate::protocol::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Running,
    Completed,
    TimedOut,
    StartFailed,
}

/// Something that can end a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The child could not be spawned.
    LaunchFailed,
    /// The child was reaped. `None` when no exit code is obtainable
    /// (killed by a signal, or waiting on it failed).
    ChildExited(Option<i32>),
    /// The hard deadline elapsed first.
    DeadlineElapsed,
}

#[derive(Debug)]
pub struct OutcomeReporter {
    state: RequestState,
    timeout_exit_code: i32,
}

impl OutcomeReporter {
    pub fn new(timeout_exit_code: i32) -> Self {
        Self {
            state: RequestState::Running,
            timeout_exit_code,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Apply a resolution. Returns the outcome only for the first one.
    pub fn resolve(&mut self, resolution: Resolution) -> Option<Outcome> {
        if self.state != RequestState::Running {
            return None;
        }

        let (state, outcome) = match resolution {
            Resolution::LaunchFailed => (RequestState::StartFailed, Outcome::start_failed()),
            Resolution::ChildExited(code) => {
                (RequestState::Completed, Outcome::from_exit_code(code))
            }
            Resolution::DeadlineElapsed => (
                RequestState::TimedOut,
                Outcome::timed_out(self.timeout_exit_code),
            ),
        };

        self.state = state;
        Some(outcome)
    }
}
