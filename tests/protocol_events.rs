// tests/protocol_events.rs

mod common;
use crate::common::capture_writer;

use std::error::Error;
use std::thread;

use serde_json::{Value, json};

use opd_supervisor::errors::SupervisorError;
use opd_supervisor::protocol::{
    Event, Extra, Outcome, PROTOCOL_VERSION, Transport, hello_event, read_request,
};
use opd_supervisor::types::{Action, Channel, EventKind, Reason};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn stdout_event_omits_unset_fields() -> TestResult {
    let event = Event::new("opd", EventKind::Stdout).with_data("hi");
    let encoded = serde_json::to_value(&event)?;
    assert_eq!(encoded, json!({"action": "opd", "event": "stdout", "data": "hi"}));
    Ok(())
}

#[test]
fn terminal_event_uses_wire_names() -> TestResult {
    let encoded = serde_json::to_value(Outcome::timed_out(124).to_event("opd"))?;
    assert_eq!(
        encoded,
        json!({
            "action": "opd",
            "event": "done",
            "ok": false,
            "exitCode": 124,
            "final": true,
            "reason": "timeout",
        })
    );

    let start_failed = serde_json::to_value(Outcome::start_failed().to_event("opd"))?;
    assert_eq!(start_failed["reason"], json!("start-failed"));
    let invalid = serde_json::to_value(Outcome::invalid_args().to_event("opd"))?;
    assert_eq!(invalid["reason"], json!("invalid-args"));
    Ok(())
}

#[test]
fn exit_codes_map_to_outcomes() {
    assert_eq!(Outcome::from_exit_code(Some(0)), Outcome::success());
    let failed = Outcome::from_exit_code(Some(7));
    assert!(!failed.ok);
    assert_eq!(failed.exit_code, 7);
    let unknown = Outcome::from_exit_code(None);
    assert!(!unknown.ok);
    assert_eq!(unknown.exit_code, 1);
    assert_eq!(unknown.reason, None);
}

#[test]
fn consumers_ignore_unknown_fields() -> TestResult {
    let event: Event = serde_json::from_str(
        r#"{"action":"opd","event":"status","data":"x","somethingNew":42}"#,
    )?;
    assert_eq!(event.event, EventKind::Status);
    assert_eq!(event.data.as_deref(), Some("x"));
    assert!(!event.is_terminal());
    Ok(())
}

#[test]
fn writer_seals_after_first_terminal_event() {
    let (writer, buf) = capture_writer();

    assert!(writer.status("working"));
    assert!(writer.finish(&Outcome::success()));
    assert!(writer.is_sealed());

    assert!(!writer.line(Channel::Stdout, "late"));
    assert!(!writer.error("late"));
    assert!(!writer.finish(&Outcome::failure()));

    let events = buf.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, EventKind::Status);
    assert_eq!(events[1].ok, Some(true));
    assert_eq!(buf.terminal().exit_code, Some(0));
}

#[test]
fn concurrent_emitters_never_interleave_lines() {
    let (writer, buf) = capture_writer();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let writer = writer.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    writer.line(Channel::Stdout, format!("thread {t} line {i} {}", "x".repeat(64)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    writer.finish(&Outcome::success());

    // `events()` panics on any line that is not a complete event.
    let events = buf.events();
    assert_eq!(events.len(), 8 * 200 + 1);
    assert_eq!(events.last().unwrap().event, EventKind::Done);
}

#[test]
fn hello_announces_protocol_and_actions() -> TestResult {
    let hello = hello_event("opd");
    assert_eq!(hello.event, EventKind::Hello);
    assert!(!hello.is_terminal());

    let extra: Extra = hello.extra.clone().unwrap();
    assert_eq!(extra["protocolVersion"], json!(PROTOCOL_VERSION));
    assert_eq!(extra["runtime"], json!("rust"));
    let actions: Vec<&str> = extra["actions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(actions.contains(&"run-stream"));
    assert!(actions.contains(&"netlify-deploy-dir"));
    Ok(())
}

#[test]
fn request_fields_are_camel_case() -> TestResult {
    let input = r#"{
        "action": "run-stream",
        "cmd": "echo hi",
        "cwd": "/tmp",
        "timeoutSec": 5,
        "idleTimeoutSec": 2,
        "env": {"A": "1"},
        "pty": true,
        "cols": 120,
        "unknownField": "ignored"
    }"#;
    let req = read_request(input.as_bytes())?;
    assert_eq!(req.action()?, Action::RunStream);

    let exec = req.execution();
    assert_eq!(exec.cmd, "echo hi");
    assert_eq!(exec.cwd.as_deref(), Some(std::path::Path::new("/tmp")));
    assert_eq!(exec.hard_timeout(), Some(std::time::Duration::from_secs(5)));
    assert_eq!(exec.idle_timeout(), Some(std::time::Duration::from_secs(2)));
    assert_eq!(exec.transport, Transport::Pty { cols: 120, rows: 24 });
    Ok(())
}

#[test]
fn non_positive_timeouts_disable_timers() -> TestResult {
    let req = read_request(
        r#"{"action":"run","cmd":"true","timeoutSec":0,"idleTimeoutSec":-3,"cwd":""}"#.as_bytes(),
    )?;
    let exec = req.execution();
    assert_eq!(exec.hard_timeout(), None);
    assert_eq!(exec.idle_timeout(), None);
    assert_eq!(exec.cwd, None);
    assert_eq!(exec.transport, Transport::Pipes);
    Ok(())
}

#[test]
fn only_the_first_document_is_read() -> TestResult {
    let req = read_request(r#"{"action":"zip-dir"} {"action":"tar-dir"}"#.as_bytes())?;
    assert_eq!(req.action()?, Action::ZipDir);
    Ok(())
}

#[test]
fn malformed_and_empty_input_are_protocol_errors() {
    let malformed = read_request("{not json".as_bytes()).unwrap_err();
    assert!(matches!(malformed, SupervisorError::ProtocolError(_)));
    assert_eq!(malformed.exit_status(), 2);

    let missing_action = read_request(r#"{"cmd":"echo"}"#.as_bytes()).unwrap_err();
    assert_eq!(missing_action.exit_status(), 2);

    let empty = read_request("   ".as_bytes()).unwrap_err();
    assert!(matches!(empty, SupervisorError::EmptyRequest));
    assert_eq!(empty.exit_status(), 2);
}

#[test]
fn unknown_action_is_rejected_with_status_2() -> TestResult {
    let req = read_request(r#"{"action":"launch-rockets"}"#.as_bytes())?;
    let err = req.action().unwrap_err();
    assert!(matches!(&err, SupervisorError::UnknownAction(a) if a == "launch-rockets"));
    assert_eq!(err.exit_status(), 2);
    Ok(())
}

#[test]
fn run_is_an_alias_of_run_stream() {
    assert_eq!("run".parse::<Action>(), Ok(Action::RunStream));
    assert_eq!("run-stream".parse::<Action>(), Ok(Action::RunStream));
    assert_eq!("checksum-file".parse::<Action>(), Ok(Action::ChecksumFile));
    assert!("".parse::<Action>().is_err());
}

#[test]
fn reasons_use_kebab_case() -> TestResult {
    assert_eq!(serde_json::to_value(Reason::InvalidArgs)?, json!("invalid-args"));
    assert_eq!(serde_json::to_value(Reason::Auth)?, json!("auth"));
    Ok(())
}
