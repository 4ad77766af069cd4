//! Time source.
//!
//! Admission checks run on every request and must not await, so the clock is a
//! plain synchronous trait. Tests substitute a manually advanced clock.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::time::Instant;

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant for measuring elapsed time.
    fn now_instant(&self) -> Instant;

    /// Wall-clock time used for row timestamps.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Process clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
