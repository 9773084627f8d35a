use std::time::Duration;

/// Expected latency of the host's frame callback.
///
/// The coarse delay is shortened by this amount so the frame callback lands
/// close to the target interval.
pub const HOST_FRAME_OVERHEAD: Duration = Duration::from_millis(4);

/// Clamps a requested frame rate into `[min_fps, max_fps]`.
///
/// Never panics: inverted or NaN bounds degrade to whichever bound wins, and a
/// NaN request resolves to `min_fps`.
pub fn clamp_rate(requested: f64, min_fps: f64, max_fps: f64) -> f64 {
    requested.max(min_fps).min(max_fps)
}

/// Clamps a measured interval (seconds) into `[1/max_fps, 1/min_fps]`.
///
/// A negative interval (clock moved backwards) floors to `1/max_fps`.
pub fn clamp_elapsed(elapsed: f64, min_fps: f64, max_fps: f64) -> f64 {
    elapsed.max(1.0 / max_fps).min(1.0 / min_fps)
}

/// Fixed simulation step for non-time-based ticking.
pub fn fixed_step(target_fps: f64) -> f64 {
    1.0 / target_fps
}

/// Coarse timer delay for one loop iteration: `max(0, 1/target - overhead)`.
pub fn coarse_delay(target_fps: f64, overhead: Duration) -> Duration {
    let secs = 1.0 / target_fps - overhead.as_secs_f64();
    if !(secs > 0.0) {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Whether `fps` allows the loop to run at all.
pub fn is_runnable(fps: f64) -> bool {
    fps > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── clamp_rate ────────────────────────────────────────────────────────

    #[test]
    fn clamp_rate_above_max() {
        assert_eq!(clamp_rate(120.0, 10.0, 60.0), 60.0);
    }

    #[test]
    fn clamp_rate_below_min() {
        assert_eq!(clamp_rate(1.0, 10.0, 60.0), 10.0);
        assert_eq!(clamp_rate(-5.0, 10.0, 60.0), 10.0);
    }

    #[test]
    fn clamp_rate_inside_range_unchanged() {
        assert_eq!(clamp_rate(30.0, 10.0, 60.0), 30.0);
    }

    #[test]
    fn clamp_rate_inverted_bounds_does_not_panic() {
        // max wins when bounds are inverted.
        assert_eq!(clamp_rate(30.0, 60.0, 10.0), 10.0);
    }

    #[test]
    fn clamp_rate_nan_request() {
        assert_eq!(clamp_rate(f64::NAN, 10.0, 60.0), 10.0);
    }

    // ── clamp_elapsed ─────────────────────────────────────────────────────

    #[test]
    fn clamp_elapsed_long_gap() {
        assert_eq!(clamp_elapsed(5.0, 10.0, 60.0), 0.1);
    }

    #[test]
    fn clamp_elapsed_short_gap() {
        assert_eq!(clamp_elapsed(0.001, 10.0, 60.0), 1.0 / 60.0);
    }

    #[test]
    fn clamp_elapsed_negative_floors_to_min_step() {
        assert_eq!(clamp_elapsed(-0.2, 10.0, 60.0), 1.0 / 60.0);
    }

    // ── coarse_delay ──────────────────────────────────────────────────────

    #[test]
    fn coarse_delay_subtracts_overhead() {
        let d = coarse_delay(50.0, HOST_FRAME_OVERHEAD);
        assert!((d.as_secs_f64() - 0.016).abs() < 1e-9);
    }

    #[test]
    fn coarse_delay_never_negative() {
        assert_eq!(coarse_delay(1000.0, HOST_FRAME_OVERHEAD), Duration::ZERO);
        assert_eq!(coarse_delay(f64::NAN, HOST_FRAME_OVERHEAD), Duration::ZERO);
    }

    #[test]
    fn coarse_delay_tiny_rate_saturates() {
        assert_eq!(coarse_delay(1e-30, Duration::ZERO), Duration::MAX);
    }

    #[test]
    fn runnable_rates() {
        assert!(is_runnable(0.5));
        assert!(!is_runnable(0.0));
        assert!(!is_runnable(-1.0));
        assert!(!is_runnable(f64::NAN));
    }
}
