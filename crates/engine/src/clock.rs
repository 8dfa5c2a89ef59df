// In crates/engine/src/clock.rs

use std::sync::atomic::{AtomicI64, Ordering};

/// Logical time of one decision loop, in epoch milliseconds.
///
/// Shared between the loop, which advances it to each candle's close time,
/// and the strategy's context, which reads it. It never moves backwards.
#[derive(Debug, Default)]
pub struct LogicalClock {
    now: AtomicI64,
}

impl LogicalClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }

    /// Moves the clock forward to `time` and returns the resulting time.
    pub fn advance_to(&self, time: i64) -> i64 {
        self.now.fetch_max(time, Ordering::AcqRel).max(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let clock = LogicalClock::new(100);
        assert_eq!(clock.advance_to(250), 250);
        assert_eq!(clock.advance_to(200), 250);
        assert_eq!(clock.now(), 250);
    }
}
