//! Time control for deterministic tests

use chrono::{DateTime, Utc};
use heisei_core::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clock that only moves when a test advances it
///
/// Both readings share one offset, so the monotonic and wall-clock views stay
/// consistent.
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_utc: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Start at the current real time.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base_instant: Instant::now(),
            base_utc: Utc::now(),
            offset: Mutex::new(Duration::ZERO),
        })
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Total time advanced so far
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Clock for ManualClock {
    fn now_instant(&self) -> Instant {
        self.base_instant + *self.offset.lock()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let offset =
            chrono::Duration::from_std(*self.offset.lock()).unwrap_or(chrono::Duration::zero());
        self.base_utc + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_moves_both_readings() {
        let clock = ManualClock::new();
        let instant = clock.now_instant();
        let utc = clock.now_utc();

        clock.advance(Duration::from_millis(1500));

        assert_eq!(clock.now_instant() - instant, Duration::from_millis(1500));
        assert_eq!((clock.now_utc() - utc).num_milliseconds(), 1500);
        assert_eq!(clock.elapsed(), Duration::from_millis(1500));
    }
}
