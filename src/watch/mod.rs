// src/watch/mod.rs

//! Liveness tracking for a running child.
//!
//! - [`clock`] holds the one piece of state shared across tasks: the time of
//!   the last output line.
//! - [`heartbeat`] periodically reports that clock as a `status` event.
//! - [`idle`] terminates the process tree once the clock goes stale.
//!
//! Both timers stop when their request-scoped cancellation token fires. The
//! heartbeat also stops on its own once the event stream has been sealed.

pub mod clock;
pub mod heartbeat;
pub mod idle;

pub use clock::ActivityClock;
pub use heartbeat::{describe_activity, spawn_heartbeat};
pub use idle::spawn_idle_watchdog;
