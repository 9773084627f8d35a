use std::rc::Rc;
use std::time::Duration;

use super::{CoarseTimer, FrameCallback, FrameHandle, FrameSource, TimerHandle};

/// Frame source for hosts without a native "next frame" primitive.
///
/// Each request becomes a coarse timer at a nominal 60 Hz interval.
pub struct TimerFrameSource {
    timer: Rc<dyn CoarseTimer>,
    interval: Duration,
}

impl TimerFrameSource {
    /// ≈16.67ms.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_nanos(16_666_667);

    pub fn new(timer: Rc<dyn CoarseTimer>) -> Self {
        Self::with_interval(timer, Self::DEFAULT_INTERVAL)
    }

    pub fn with_interval(timer: Rc<dyn CoarseTimer>, interval: Duration) -> Self {
        Self { timer, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameSource for TimerFrameSource {
    fn request_next_frame(&self, callback: FrameCallback) -> FrameHandle {
        let TimerHandle(id) = self.timer.schedule(self.interval, callback);
        FrameHandle(id)
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.timer.cancel(TimerHandle(handle.0));
    }
}
