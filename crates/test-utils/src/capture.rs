//! In-memory event sink for asserting on the NDJSON stream.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use opd_supervisor::protocol::{Event, EventWriter};
use opd_supervisor::types::EventKind;

/// A cloneable `Write` target backed by a shared buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.inner.lock().unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Every line parsed as an `Event`, in write order.
    pub fn events(&self) -> Vec<Event> {
        self.contents()
            .lines()
            .map(|line| {
                serde_json::from_str(line)
                    .unwrap_or_else(|e| panic!("not an event line: {line:?}: {e}"))
            })
            .collect()
    }

    /// `data` of every event of the given kind.
    pub fn data_of(&self, kind: EventKind) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.event == kind)
            .filter_map(|e| e.data)
            .collect()
    }

    /// The terminal event; panics unless exactly one was written.
    pub fn terminal(&self) -> Event {
        let mut done: Vec<Event> = self
            .events()
            .into_iter()
            .filter(|e| e.event == EventKind::Done)
            .collect();
        assert_eq!(done.len(), 1, "expected exactly one done event, got {done:?}");
        done.remove(0)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An `EventWriter` tagged `opd` plus the buffer it writes to.
pub fn capture_writer() -> (EventWriter, SharedBuffer) {
    let buf = SharedBuffer::new();
    (EventWriter::new(buf.clone(), "opd"), buf)
}
