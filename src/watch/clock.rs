// src/watch/clock.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// Monotonic "last activity" timestamp.
///
/// Stored as milliseconds since the clock was created and only ever advanced
/// with `fetch_max`, so concurrent writers can never move it backwards.
/// Creation counts as the first activity.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    origin_wall: SystemTime,
    last_ms: AtomicU64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_wall: SystemTime::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        let now = self.elapsed_ms();
        self.last_ms.fetch_max(now, Ordering::AcqRel);
    }

    /// Time elapsed since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let last = self.last_ms.load(Ordering::Acquire);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    /// Wall-clock time of the last recorded activity.
    pub fn last_activity(&self) -> SystemTime {
        self.origin_wall + Duration::from_millis(self.last_ms.load(Ordering::Acquire))
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
