use std::time::Duration;

use crate::time::HOST_FRAME_OVERHEAD;

/// Scheduler configuration.
///
/// Fields are plain values and are not validated on assignment. Bounds are
/// applied where they are used: by `set_rate` and by the per-tick elapsed
/// computation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Rate applied through `set_rate` at construction.
    pub initial_fps: f64,

    /// Lower bound for the target rate; `1 / min_fps` caps the elapsed value.
    pub min_fps: f64,

    /// Upper bound for the target rate; `1 / max_fps` floors the elapsed value.
    pub max_fps: f64,

    /// Disables clamping of both the target rate and the measured elapsed time.
    pub allow_exceed_rate_range: bool,

    /// When false, every tick receives the fixed step `1 / target_fps`.
    pub time_based: bool,

    /// Quiet-pause when the host reports hidden.
    pub pause_on_hidden: bool,

    /// Quiet-resume when the host reports shown.
    pub resume_on_shown: bool,

    /// Subtracted from the coarse delay to absorb frame-callback latency.
    pub frame_overhead: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_fps: 60.0,
            min_fps: 10.0,
            max_fps: 60.0,
            allow_exceed_rate_range: false,
            time_based: true,
            pause_on_hidden: false,
            resume_on_shown: false,
            frame_overhead: HOST_FRAME_OVERHEAD,
        }
    }
}

impl SchedulerConfig {
    /// Pause when hidden and resume when shown.
    pub fn follow_visibility(mut self) -> Self {
        self.pause_on_hidden = true;
        self.resume_on_shown = true;
        self
    }
}
