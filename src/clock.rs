//! Monotonic millisecond clock.

/// Millisecond timestamp. Wraps around after ~49.7 days.
pub type Instant = fugit::TimerInstantU32<1000>;

/// Millisecond duration.
pub type Duration = fugit::MillisDurationU32;

pub trait Clock {
    /// Current time
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Time elapsed from `since` to `now`.
///
/// Uses wrapping subtraction, so the result stays correct across a single wraparound of the tick
/// counter.
#[inline]
#[must_use]
pub const fn elapsed(since: Instant, now: Instant) -> Duration {
    Duration::from_ticks(now.ticks().wrapping_sub(since.ticks()))
}

/// Fake clock for testing
#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use super::{Clock, Duration, Instant};

    /// A clock that only moves when told to
    #[derive(Debug, Default)]
    pub struct FakeClock {
        ticks: u32,
    }

    impl FakeClock {
        pub const fn new(ticks: u32) -> Self {
            Self { ticks }
        }

        pub fn advance(&mut self, by: Duration) {
            self.ticks = self.ticks.wrapping_add(by.ticks());
        }

        pub fn set(&mut self, ticks: u32) {
            self.ticks = ticks;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            Instant::from_ticks(self.ticks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_plain() {
        let since = Instant::from_ticks(1_000);
        let now = Instant::from_ticks(1_750);
        assert_eq!(elapsed(since, now), Duration::millis(750));
    }

    #[test]
    fn elapsed_across_wraparound() {
        let since = Instant::from_ticks(u32::MAX - 99);
        let now = Instant::from_ticks(650);
        assert_eq!(elapsed(since, now).ticks(), 750);
    }
}
