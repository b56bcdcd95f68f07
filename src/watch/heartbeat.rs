// src/watch/heartbeat.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::EventWriter;
use crate::watch::clock::ActivityClock;

/// Human-readable heartbeat payload.
///
/// e.g. `running, last activity: 2026-10-19T08:15:02Z (7s ago)`
pub fn describe_activity(clock: &ActivityClock) -> String {
    let last: DateTime<Utc> = clock.last_activity().into();
    format!(
        "running, last activity: {} ({}s ago)",
        last.to_rfc3339_opts(SecondsFormat::Secs, true),
        clock.idle_for().as_secs()
    )
}

/// Emit a `status` event every `period` until cancelled.
///
/// The first beat fires one full period after start. Heartbeats are not
/// activity: they never touch the clock they report.
pub fn spawn_heartbeat(
    writer: EventWriter,
    clock: Arc<ActivityClock>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !writer.status(describe_activity(&clock)) {
                        break;
                    }
                }
            }
        }

        debug!("heartbeat stopped");
    })
}
