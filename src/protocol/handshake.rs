// src/protocol/handshake.rs

use serde_json::{Value, json};

use crate::protocol::event::{Event, Extra};
use crate::types::{Action, EventKind};

/// Version of the NDJSON protocol announced in `hello`.
pub const PROTOCOL_VERSION: &str = "1";

/// Build the `hello` event written before the request is read.
///
/// It lets a caller detect a capability mismatch before sending a payload.
pub fn hello_event(action: &str) -> Event {
    let mut extra = Extra::new();
    extra.insert("protocolVersion".into(), json!(PROTOCOL_VERSION));
    extra.insert("runtime".into(), json!("rust"));
    extra.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));
    extra.insert("os".into(), json!(std::env::consts::OS));
    extra.insert("arch".into(), json!(std::env::consts::ARCH));
    extra.insert(
        "actions".into(),
        Value::Array(Action::NAMES.iter().map(|a| json!(a)).collect()),
    );
    extra.insert("pty".into(), json!(cfg!(unix)));

    Event::new(action, EventKind::Hello)
        .with_data(format!("opd-supervisor {}", env!("CARGO_PKG_VERSION")))
        .with_extra(extra)
}
