// src/engine/supervisor.rs

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::SupervisorSettings;
use crate::engine::reporter::{OutcomeReporter, Resolution};
use crate::exec::{Launched, TreeKill, launch, pump_lines};
use crate::protocol::{EventWriter, ExecutionRequest, Outcome};
use crate::watch::{ActivityClock, spawn_heartbeat, spawn_idle_watchdog};

/// Runs one [`ExecutionRequest`] and streams it through an [`EventWriter`].
///
/// This is the IO shell around [`OutcomeReporter`]: it owns the child, spawns
/// the output readers and timers, and races child exit against the hard
/// deadline. Whatever happens, exactly one terminal event is written.
#[derive(Debug, Clone)]
pub struct Supervisor {
    settings: SupervisorSettings,
    writer: EventWriter,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings, writer: EventWriter) -> Self {
        Self { settings, writer }
    }

    pub fn writer(&self) -> &EventWriter {
        &self.writer
    }

    /// Execute `req` to completion and return the reported outcome.
    pub async fn run(&self, req: &ExecutionRequest) -> Outcome {
        let started = Instant::now();
        let mut reporter = OutcomeReporter::new(self.settings.timeout_exit_code);

        let Launched {
            mut child,
            outputs,
            tree,
        } = match launch(req, self.settings.kill_grace) {
            Ok(launched) => launched,
            Err(err) => {
                error!(cmd = %req.cmd, error = %err, "failed to start child process");
                self.writer.error(format!("failed to start command: {err}"));
                return self.report(&mut reporter, Resolution::LaunchFailed);
            }
        };

        // Timers hang off this token; the guard cancels it on every return path.
        let scope = CancellationToken::new();
        let _scope_guard = scope.clone().drop_guard();

        let clock = Arc::new(ActivityClock::new());

        let readers: Vec<JoinHandle<()>> = outputs
            .into_iter()
            .map(|(channel, stream)| {
                tokio::spawn(pump_lines(
                    stream,
                    channel,
                    self.writer.clone(),
                    Arc::clone(&clock),
                    self.settings.max_line_bytes,
                ))
            })
            .collect();

        spawn_heartbeat(
            self.writer.clone(),
            Arc::clone(&clock),
            self.settings.heartbeat_interval,
            scope.child_token(),
        );

        if let Some(limit) = req.idle_timeout() {
            let kill: Arc<dyn TreeKill> = tree.clone();
            spawn_idle_watchdog(
                Arc::clone(&clock),
                limit,
                self.settings.idle_check_interval,
                kill,
                scope.child_token(),
            );
        }

        let (exit_tx, exit_rx) = oneshot::channel::<Option<i32>>();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => {
                    info!(
                        exit_code = ?status.code(),
                        success = status.success(),
                        "child process exited"
                    );
                    status.code()
                }
                Err(err) => {
                    warn!(error = %err, "waiting for child process failed");
                    None
                }
            };
            let _ = exit_tx.send(code);
        });

        let hard_timeout = req.hard_timeout();
        let resolution = tokio::select! {
            code = exit_rx => Resolution::ChildExited(code.unwrap_or(None)),
            _ = deadline(started, hard_timeout) => Resolution::DeadlineElapsed,
        };

        match resolution {
            Resolution::DeadlineElapsed => {
                warn!(
                    timeout_secs = req.timeout_sec,
                    "hard timeout exceeded; terminating process tree"
                );
                tree.terminate().await;
            }
            Resolution::ChildExited(_) if tree.triggered() => {
                // The idle watchdog is mid-termination; let it finish so no
                // descendant outlives the report.
                tree.terminate().await;
            }
            _ => {}
        }

        self.drain(readers).await;

        if resolution == Resolution::DeadlineElapsed {
            self.writer
                .error(format!("deadline exceeded after {}s", req.timeout_sec));
        }

        self.report(&mut reporter, resolution)
    }

    /// Wait for the output readers so trailing lines precede the terminal
    /// event. Bounded: a descendant may keep a pipe open indefinitely.
    async fn drain(&self, readers: Vec<JoinHandle<()>>) {
        if timeout(self.settings.drain_timeout, join_all(readers))
            .await
            .is_err()
        {
            debug!(
                drain_ms = self.settings.drain_timeout.as_millis() as u64,
                "output still open after drain window; later lines are dropped"
            );
        }
    }

    fn report(&self, reporter: &mut OutcomeReporter, resolution: Resolution) -> Outcome {
        let outcome = reporter.resolve(resolution).unwrap_or_else(Outcome::failure);
        self.writer.finish(&outcome);
        info!(
            ok = outcome.ok,
            exit_code = outcome.exit_code,
            reason = ?outcome.reason,
            state = ?reporter.state(),
            "request finished"
        );
        outcome
    }
}

/// Resolves when the hard limit elapses; never, if there is none or it lies
/// beyond what `Instant` can represent.
async fn deadline(started: Instant, limit: Option<Duration>) {
    match limit.and_then(|limit| started.checked_add(limit)) {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
