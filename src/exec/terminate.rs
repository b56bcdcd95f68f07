// src/exec/terminate.rs

//! Process-tree termination.
//!
//! The rest of the crate only sees the [`TreeKill`] capability; how a tree is
//! torn down is a per-platform detail of [`ProcessGroup`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Terminate a child together with all of its descendants.
///
/// Implementations must be idempotent, safe to call concurrently, and must
/// never fail loudly: a tree that is already gone counts as terminated.
pub trait TreeKill: Send + Sync {
    fn terminate(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Whether `terminate` has been called at least once.
    fn triggered(&self) -> bool;
}

/// The process group (POSIX) or process tree (Windows) rooted at the child.
///
/// Only the pid is kept, so the handle stays usable after the primary
/// `Child` has been reaped while descendants are still alive.
#[derive(Debug)]
pub struct ProcessGroup {
    pid: Option<u32>,
    grace: Duration,
    triggered: AtomicBool,
    done: OnceCell<()>,
}

impl ProcessGroup {
    pub fn new(pid: Option<u32>, grace: Duration) -> Self {
        Self {
            pid,
            grace,
            triggered: AtomicBool::new(false),
            done: OnceCell::new(),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl TreeKill for ProcessGroup {
    fn terminate(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.triggered.store(true, Ordering::SeqCst);
            // Concurrent callers all wait for the single in-flight sequence.
            self.done
                .get_or_init(|| async {
                    match self.pid {
                        Some(pid) => {
                            info!(pid, grace_ms = self.grace.as_millis() as u64, "terminating process tree");
                            kill_tree(pid, self.grace).await;
                        }
                        None => debug!("no pid recorded; nothing to terminate"),
                    }
                })
                .await;
        })
    }

    fn triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

#[cfg(unix)]
async fn kill_tree(pid: u32, grace: Duration) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    use tracing::warn;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid does not fit a process group id; skipping termination");
        return;
    };
    let pgid = Pid::from_raw(raw);

    match killpg(pgid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => {
            debug!(pid, "process group already gone");
            return;
        }
        Err(err) => warn!(pid, error = %err, "SIGTERM to process group failed"),
    }

    tokio::time::sleep(grace).await;

    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) => debug!(pid, "SIGKILL sent to process group"),
        Err(Errno::ESRCH) => debug!(pid, "process group exited within grace period"),
        Err(err) => warn!(pid, error = %err, "SIGKILL to process group failed"),
    }
}

#[cfg(windows)]
async fn kill_tree(pid: u32, _grace: Duration) {
    use std::process::Stdio;

    use tracing::warn;

    // No signal groups here: taskkill /T walks the descendants for us.
    let res = tokio::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match res {
        Ok(status) if status.success() => debug!(pid, "taskkill succeeded"),
        // Exit code 128: process not found, i.e. already gone.
        Ok(status) => debug!(pid, code = ?status.code(), "taskkill reported failure"),
        Err(err) => warn!(pid, error = %err, "failed to run taskkill"),
    }
}

#[cfg(not(any(unix, windows)))]
async fn kill_tree(pid: u32, _grace: Duration) {
    tracing::warn!(pid, "process tree termination unsupported on this platform");
}
