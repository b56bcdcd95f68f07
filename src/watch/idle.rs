// src/watch/idle.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::exec::TreeKill;
use crate::watch::clock::ActivityClock;

/// Terminate the process tree once nothing has been output for `limit`.
///
/// Checks every `check_every`, fires at most once and then stops. It does not
/// decide the outcome: the killed child is reported through the ordinary
/// exit path.
pub fn spawn_idle_watchdog(
    clock: Arc<ActivityClock>,
    limit: Duration,
    check_every: Duration,
    tree: Arc<dyn TreeKill>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + check_every, check_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("idle watchdog cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let idle = clock.idle_for();
                    if idle > limit {
                        warn!(
                            idle_ms = idle.as_millis() as u64,
                            limit_secs = limit.as_secs(),
                            "no output within idle timeout; terminating process tree"
                        );
                        tree.terminate().await;
                        return;
                    }
                }
            }
        }
    })
}
