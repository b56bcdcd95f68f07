// src/exec/launcher.rs

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::exec::pty;
use crate::exec::terminate::ProcessGroup;
use crate::protocol::{ExecutionRequest, Transport};
use crate::types::Channel;

/// A readable output channel of the child.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// A started child and everything needed to supervise it.
pub struct Launched {
    pub child: Child,
    /// One entry per output channel (two for pipes, one for a PTY).
    pub outputs: Vec<(Channel, OutputStream)>,
    /// Handle on the child's process group; outlives `child`.
    pub tree: Arc<ProcessGroup>,
}

/// Build a shell command appropriate for the platform.
///
/// An empty command line still starts a shell, running its no-op builtin.
pub fn shell_command(cmdline: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd.exe");
        c.arg("/d").arg("/s").arg("/c");
        if cmdline.trim().is_empty() {
            c.arg("rem");
        } else {
            c.arg(cmdline);
        }
        c
    } else {
        let mut c = Command::new("/bin/sh");
        c.arg("-c");
        if cmdline.trim().is_empty() {
            c.arg(":");
        } else {
            c.arg(cmdline);
        }
        c
    }
}

/// Start the child described by `req`.
///
/// The error case is a start failure: the child never entered the running
/// state and there is nothing to terminate.
pub fn launch(req: &ExecutionRequest, kill_grace: Duration) -> io::Result<Launched> {
    let mut cmd = shell_command(&req.cmd);

    if let Some(cwd) = &req.cwd {
        cmd.current_dir(cwd);
    }
    if let Some(overrides) = req.env_overrides() {
        // Inherited environment plus overrides; an override wins on collision.
        cmd.envs(overrides);
    }
    isolate_process_group(&mut cmd);

    let launched = match req.transport {
        Transport::Pipes => launch_with_pipes(cmd)?,
        Transport::Pty { cols, rows } if pty::SUPPORTED => {
            pty::launch_with_pty(cmd, cols, rows)?
        }
        Transport::Pty { .. } => {
            warn!("pty transport requested but unsupported on this platform; using pipes");
            launch_with_pipes(cmd)?
        }
    };

    let pid = launched.0.id();
    info!(pid = ?pid, cmd = %req.cmd, transport = ?req.transport, "child process started");

    Ok(Launched {
        child: launched.0,
        outputs: launched.1,
        tree: Arc::new(ProcessGroup::new(pid, kill_grace)),
    })
}

fn launch_with_pipes(mut cmd: Command) -> io::Result<(Child, Vec<(Channel, OutputStream)>)> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    let mut outputs: Vec<(Channel, OutputStream)> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        outputs.push((Channel::Stdout, Box::new(stdout)));
    }
    if let Some(stderr) = child.stderr.take() {
        outputs.push((Channel::Stderr, Box::new(stderr)));
    }

    Ok((child, outputs))
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    // pgid == pid, so the whole subtree can be signalled through -pid.
    cmd.process_group(0);
}

#[cfg(windows)]
fn isolate_process_group(cmd: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn isolate_process_group(_cmd: &mut Command) {}
