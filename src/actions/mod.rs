// src/actions/mod.rs

//! Collaborator actions that share the supervisor's event protocol.
//!
//! None of these spawn a child; they are sequential file or network work
//! that report `status` / `error` events and finish with one `done`.
//!
//! - [`archive`]: `zip-dir` and `tar-dir`.
//! - [`checksum`]: `checksum-file`.
//! - [`deploy`]: `netlify-deploy-dir`.

pub mod archive;
pub mod checksum;
pub mod deploy;

use crate::protocol::{EventWriter, Outcome};

/// Write `outcome` as the terminal event and hand it back.
pub(crate) fn conclude(writer: &EventWriter, outcome: Outcome) -> Outcome {
    writer.finish(&outcome);
    outcome
}

/// Report a failure as `error` + terminal `done`.
pub(crate) fn fail(writer: &EventWriter, message: impl Into<String>, outcome: Outcome) -> Outcome {
    writer.error(message);
    conclude(writer, outcome)
}
