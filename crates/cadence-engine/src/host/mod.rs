//! Host collaborators.
//!
//! The scheduler never talks to a platform directly. It consumes four small
//! traits, bundled into [`HostBindings`] at construction:
//! - [`Clock`] for timestamps
//! - [`CoarseTimer`] for the rate-limiting delay
//! - [`FrameSource`] for "call me at the next display frame"
//! - [`VisibilitySource`] for the unified hidden/shown signal
//!
//! Implementations must not hold internal borrows while invoking a callback:
//! callbacks routinely re-enter the host to schedule the next request.

mod fallback;
mod manual;

use std::rc::Rc;
use std::time::Duration;

pub use crate::time::{Clock, SystemClock};
pub use fallback::TimerFrameSource;
pub use manual::ManualHost;

pub type TimerCallback = Box<dyn FnOnce()>;
pub type FrameCallback = Box<dyn FnOnce()>;
pub type VisibilityCallback = Box<dyn FnMut(bool)>;

/// Identifies a pending coarse timer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TimerHandle(pub u64);

/// Identifies a pending frame request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameHandle(pub u64);

/// Identifies a visibility subscription.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubscriptionId(pub u64);

/// Fire-once delay timer.
pub trait CoarseTimer {
    /// Arms a timer that invokes `callback` once, no earlier than `delay` from now.
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle;

    /// Cancels a pending timer. Unknown or already-fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

/// Host facility that invokes a callback at the next opportune rendering moment.
pub trait FrameSource {
    fn request_next_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancels a pending request. Unknown or already-fired handles are ignored.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Emits `true` when the host surface becomes hidden and `false` when shown.
pub trait VisibilitySource {
    fn subscribe(&self, callback: VisibilityCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// The collaborators a scheduler is constructed with.
///
/// `visibility` is optional: headless hosts have no such signal.
#[derive(Clone)]
pub struct HostBindings {
    pub clock:      Rc<dyn Clock>,
    pub timer:      Rc<dyn CoarseTimer>,
    pub frames:     Rc<dyn FrameSource>,
    pub visibility: Option<Rc<dyn VisibilitySource>>,
}

impl HostBindings {
    /// Bindings for a host with no native frame primitive and no visibility
    /// signal: frames are approximated by the timer.
    pub fn timer_only(clock: Rc<dyn Clock>, timer: Rc<dyn CoarseTimer>) -> Self {
        let frames: Rc<dyn FrameSource> = Rc::new(TimerFrameSource::new(Rc::clone(&timer)));
        Self {
            clock,
            timer,
            frames,
            visibility: None,
        }
    }
}

impl std::fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBindings")
            .field("has_visibility", &self.visibility.is_some())
            .finish_non_exhaustive()
    }
}
