//! Time sources.
//!
//! Every component of a live session reads time from one shared [`Clock`]
//! so durations computed from different call sites agree with each other.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

pub trait Clock: Clone {
    fn now(&self) -> DateTime<Utc>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and log replay.
///
/// Clones share the same instant, so advancing one advances all of them.
#[derive(Debug, Clone)]
pub struct ManualClock {
    epoch_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            epoch_ms: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Move the clock to `at`. Moving backwards is ignored.
    pub fn set(&self, at: DateTime<Utc>) {
        self.set_ms(at.timestamp_millis());
    }

    /// Move the clock to `epoch_ms`. Moving backwards is ignored.
    pub fn set_ms(&self, epoch_ms: i64) {
        self.epoch_ms.fetch_max(epoch_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: i64) {
        self.epoch_ms.fetch_add(ms.max(0), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.epoch_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
    }

    fn now_ms(&self) -> i64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_000).unwrap());
        let other = clock.clone();
        clock.advance_ms(250);
        assert_eq!(other.now_ms(), 1_250);
    }

    #[test]
    fn manual_clock_never_moves_backwards() {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(5_000).unwrap());
        clock.set(Utc.timestamp_millis_opt(4_000).unwrap());
        assert_eq!(clock.now_ms(), 5_000);
        clock.advance_ms(-100);
        assert_eq!(clock.now_ms(), 5_000);
    }
}
