use std::time::{Duration, Instant};

/// Monotonic time source consumed by the scheduler.
///
/// `now()` returns the time elapsed since an arbitrary, fixed origin. Only
/// differences between readings are meaningful.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// `Instant`-backed clock.
///
/// The origin is the moment the clock was created, so readings start near zero.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Converts an `Instant` into a reading on this clock.
    ///
    /// Instants taken before the origin saturate to zero.
    pub fn reading_at(&self, instant: Instant) -> Duration {
        instant.saturating_duration_since(self.origin)
    }

    /// Converts a reading on this clock back into an `Instant`.
    ///
    /// `None` if the instant is not representable on this platform.
    pub fn instant_at(&self, reading: Duration) -> Option<Instant> {
        self.origin.checked_add(reading)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Signed difference `later - earlier` in seconds.
///
/// Readings may come from a clock that was adjusted backwards, so the result
/// can be negative. Callers decide whether to clamp.
pub fn seconds_between(earlier: Duration, later: Duration) -> f64 {
    later.as_secs_f64() - earlier.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn reading_round_trips_through_instant() {
        let clock = SystemClock::new();
        let reading = Duration::from_millis(250);
        let instant = clock.instant_at(reading).unwrap();
        assert_eq!(clock.reading_at(instant), reading);
    }

    #[test]
    fn far_future_reading_is_not_representable() {
        let clock = SystemClock::new();
        assert!(clock.instant_at(Duration::MAX).is_none());
    }

    #[test]
    fn seconds_between_forward() {
        let d = seconds_between(Duration::from_millis(100), Duration::from_millis(350));
        assert!((d - 0.25).abs() < 1e-12);
    }

    #[test]
    fn seconds_between_backward_is_negative() {
        // Host clock adjusted backwards.
        let d = seconds_between(Duration::from_millis(500), Duration::from_millis(400));
        assert!((d + 0.1).abs() < 1e-12);
    }
}
