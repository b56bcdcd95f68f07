// src/protocol/writer.rs

//! Serialized access to the event sink.
//!
//! Every emitter (output readers, heartbeat, outcome reporting, collaborator
//! actions) holds a clone of the same [`EventWriter`]. Each event is encoded
//! and written under one lock, so concurrent emitters never interleave
//! partial lines. Once the terminal event has been written the writer is
//! sealed and every later write is dropped.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::protocol::event::{Event, Outcome};
use crate::types::{Channel, EventKind};

struct WriterState {
    out: Box<dyn Write + Send>,
    sealed: bool,
}

#[derive(Clone)]
pub struct EventWriter {
    state: Arc<Mutex<WriterState>>,
    action: Arc<str>,
}

impl fmt::Debug for EventWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventWriter")
            .field("action", &self.action)
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

impl EventWriter {
    pub fn new<W>(out: W, action: impl Into<String>) -> Self
    where
        W: Write + Send + 'static,
    {
        let action: String = action.into();
        Self {
            state: Arc::new(Mutex::new(WriterState {
                out: Box::new(out),
                sealed: false,
            })),
            action: Arc::from(action),
        }
    }

    /// Writer bound to the process STDOUT.
    pub fn stdout(action: impl Into<String>) -> Self {
        Self::new(io::stdout(), action)
    }

    /// The `action` tag stamped on every event.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn is_sealed(&self) -> bool {
        self.lock().sealed
    }

    /// Write a non-terminal event.
    ///
    /// Returns `false` if the stream is already sealed or the write failed;
    /// background emitters use that as their signal to stop.
    pub fn emit(&self, event: &Event) -> bool {
        let mut state = self.lock();
        if state.sealed {
            debug!(event = ?event.event, "event dropped after terminal event");
            return false;
        }
        write_line(&mut state, event)
    }

    /// Write the terminal event and seal the stream.
    ///
    /// Only the first call has any effect; later calls return `false`.
    pub fn finish(&self, outcome: &Outcome) -> bool {
        let event = outcome.to_event(&self.action);
        let mut state = self.lock();
        if state.sealed {
            warn!(
                exit_code = outcome.exit_code,
                "terminal event already written; ignoring second outcome"
            );
            return false;
        }
        state.sealed = true;
        write_line(&mut state, &event)
    }

    pub fn status(&self, data: impl Into<String>) -> bool {
        self.emit(&Event::new(self.action(), EventKind::Status).with_data(data))
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.emit(&Event::new(self.action(), EventKind::Error).with_error(message))
    }

    pub fn line(&self, channel: Channel, line: impl Into<String>) -> bool {
        self.emit(&Event::new(self.action(), channel.kind()).with_data(line))
    }

    fn lock(&self) -> MutexGuard<'_, WriterState> {
        // A panicking emitter must not take the whole stream down with it.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn write_line(state: &mut WriterState, event: &Event) -> bool {
    let mut line = match serde_json::to_vec(event) {
        Ok(line) => line,
        Err(err) => {
            warn!(error = %err, "failed to encode event");
            return false;
        }
    };
    line.push(b'\n');

    let res = state
        .out
        .write_all(&line)
        .and_then(|()| state.out.flush());

    match res {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "failed to write event to sink");
            false
        }
    }
}
