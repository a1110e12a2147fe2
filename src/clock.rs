//! Monotonic microsecond timestamps.
//!
//! The recorder only ever subtracts two readings taken on the same thread, so
//! the epoch is irrelevant; timestamps count from the first reading in the
//! process.

use std::sync::OnceLock;
use std::time::Instant;

/// Source of monotonic microsecond timestamps
pub trait Clock: Send + Sync {
    /// Current reading in microseconds. Never decreases.
    fn now_micros(&self) -> u64;
}

/// Clock backed by `std::time::Instant`
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now_micros(&self) -> u64 {
        timestamp_now_micros()
    }
}

/// Microseconds elapsed since the first call in this process
pub fn timestamp_now_micros() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamps_are_monotonic() {
        let clock = MonotonicClock;
        let mut previous = clock.now_micros();
        for _ in 0..1000 {
            let now = clock.now_micros();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn test_timestamps_advance_in_microseconds() {
        let clock = MonotonicClock;
        let begin = clock.now_micros();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = clock.now_micros() - begin;
        assert!(elapsed >= 5_000, "elapsed {}us", elapsed);
    }
}
