//! High-resolution clock used to time passes.

use crate::error::{EngineError, Result};
use std::time::Duration;

/// Spin iterations allowed before a clock that never advances is rejected.
const PROBE_SPINS: usize = 1_000_000;

/// Monotonic clock. `now` returns the offset since an arbitrary fixed origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;

    /// Seconds between two readings; zero if `end` is not after `start`.
    fn elapsed_secs(&self, start: Duration, end: Duration) -> f64 {
        end.saturating_sub(start).as_secs_f64()
    }
}

/// TSC-backed clock from `quanta`.
pub struct QuantaClock {
    clock: quanta::Clock,
    origin: quanta::Instant,
}

impl QuantaClock {
    pub fn new() -> Self {
        let clock = quanta::Clock::new();
        let origin = clock.now();
        Self { clock, origin }
    }
}

impl Default for QuantaClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for QuantaClock {
    fn now(&self) -> Duration {
        self.clock.now().duration_since(self.origin)
    }
}

/// Verify that a clock advances. Fails with [`EngineError::ClockUnavailable`]
/// if it stays frozen for the whole probe.
pub fn probe(clock: &dyn Clock) -> Result<()> {
    let start = clock.now();
    for _ in 0..PROBE_SPINS {
        if clock.now() > start {
            return Ok(());
        }
        std::hint::spin_loop();
    }
    Err(EngineError::ClockUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FrozenClock;

    impl Clock for FrozenClock {
        fn now(&self) -> Duration {
            Duration::from_secs(7)
        }
    }

    #[test]
    fn test_quanta_clock_advances() {
        let clock = QuantaClock::new();
        assert!(probe(&clock).is_ok());
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        let b = clock.now();
        assert!(clock.elapsed_secs(a, b) > 0.0);
    }

    #[test]
    fn test_frozen_clock_rejected() {
        assert!(matches!(probe(&FrozenClock), Err(EngineError::ClockUnavailable)));
    }

    #[test]
    fn test_elapsed_never_negative() {
        let clock = FrozenClock;
        let elapsed = clock.elapsed_secs(Duration::from_secs(2), Duration::from_secs(1));
        assert!(elapsed.abs() < f64::EPSILON);
    }
}
