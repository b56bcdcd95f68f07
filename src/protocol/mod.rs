// src/protocol/mod.rs

//! Wire protocol between the supervisor and its caller.
//!
//! - [`request`] parses the single JSON request read from STDIN.
//! - [`event`] defines the NDJSON event schema written to STDOUT.
//! - [`writer`] serializes every event through one locked sink and refuses
//!   writes once the terminal event is out.
//! - [`handshake`] builds the `hello` capability announcement.

pub mod event;
pub mod handshake;
pub mod request;
pub mod writer;

pub use event::{Event, Extra, Outcome};
pub use handshake::{PROTOCOL_VERSION, hello_event};
pub use request::{ExecutionRequest, Request, Transport, read_request};
pub use writer::EventWriter;
