// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually starting the requested command
//! using `tokio::process::Command`, reading its output and tearing the whole
//! process tree down when asked to.
//!
//! - [`launcher`] builds the platform shell invocation and spawns the child
//!   in its own process group.
//! - [`pty`] is the alternate transport where the child talks to a
//!   pseudo-terminal instead of pipes.
//! - [`output`] splits a byte stream into lines and forwards them as events.
//! - [`terminate`] provides the [`TreeKill`] capability and its per-platform
//!   [`ProcessGroup`] implementation.

pub mod launcher;
pub mod output;
pub mod pty;
pub mod terminate;

pub use launcher::{Launched, OutputStream, launch, shell_command};
pub use output::{LineCodec, LineError, pump_lines};
pub use terminate::{ProcessGroup, TreeKill};
