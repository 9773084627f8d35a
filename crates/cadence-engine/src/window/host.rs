use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use winit::window::Window;

use crate::host::{
    Clock,
    CoarseTimer,
    FrameCallback,
    FrameHandle,
    FrameSource,
    HostBindings,
    SubscriptionId,
    SystemClock,
    TimerCallback,
    TimerHandle,
    VisibilityCallback,
    VisibilitySource,
};

/// Host collaborators backed by a winit event loop.
///
/// - timers are stored here and fired by the runtime in `about_to_wait`
/// - frame requests become `Window::request_redraw` and are delivered on
///   `RedrawRequested`
/// - visibility is fed from window occlusion/focus events
///
/// Create one before [`crate::window::Runtime::run`], build the scheduler from
/// [`bindings`](Self::bindings), then hand the host to the runtime.
#[derive(Clone)]
pub struct WinitHost {
    inner: Rc<HostState>,
}

struct HostState {
    clock:       SystemClock,
    next_id:     Cell<u64>,
    timers:      RefCell<Vec<(TimerHandle, Duration, TimerCallback)>>,
    frames:      RefCell<Vec<(FrameHandle, FrameCallback)>>,
    subscribers: RefCell<Vec<(SubscriptionId, Rc<RefCell<VisibilityCallback>>)>>,
    window:      RefCell<Option<Rc<Window>>>,
    hidden:      Cell<bool>,
}

impl HostState {
    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

impl WinitHost {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(HostState {
                clock: SystemClock::new(),
                next_id: Cell::new(0),
                timers: RefCell::new(Vec::new()),
                frames: RefCell::new(Vec::new()),
                subscribers: RefCell::new(Vec::new()),
                window: RefCell::new(None),
                hidden: Cell::new(false),
            }),
        }
    }

    pub fn bindings(&self) -> HostBindings {
        HostBindings {
            clock:      Rc::new(self.clone()),
            timer:      Rc::new(self.clone()),
            frames:     Rc::new(self.clone()),
            visibility: Some(Rc::new(self.clone())),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.get()
    }

    // ── runtime-facing ────────────────────────────────────────────────────

    pub(crate) fn attach_window(&self, window: Rc<Window>) {
        if !self.inner.frames.borrow().is_empty() {
            window.request_redraw();
        }
        *self.inner.window.borrow_mut() = Some(window);
    }

    pub(crate) fn detach_window(&self) {
        self.inner.window.borrow_mut().take();
    }

    /// Fires every timer due at `now`. Timers armed by the callbacks wait for
    /// the next call, even if already due.
    pub(crate) fn fire_due_timers(&self, now: Instant) -> usize {
        let reading = self.inner.clock.reading_at(now);

        let due: Vec<TimerCallback> = {
            let mut timers = self.inner.timers.borrow_mut();
            let mut due = Vec::new();
            let mut i = 0;
            while i < timers.len() {
                if timers[i].1 <= reading {
                    let (_, _, callback) = timers.remove(i);
                    due.push(callback);
                } else {
                    i += 1;
                }
            }
            due
        };

        let count = due.len();
        for callback in due {
            callback();
        }
        count
    }

    /// Earliest pending deadline, if any. Unrepresentable deadlines are ignored.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        let earliest = self.inner.timers.borrow().iter().map(|(_, d, _)| *d).min()?;
        self.inner.clock.instant_at(earliest)
    }

    /// Runs the frame callbacks requested before this redraw.
    pub(crate) fn deliver_frames(&self) -> usize {
        let frames: Vec<_> = self.inner.frames.borrow_mut().drain(..).collect();
        let count = frames.len();
        for (_, callback) in frames {
            callback();
        }
        count
    }

    /// Emits the hidden signal when the state actually changes.
    pub(crate) fn set_hidden(&self, hidden: bool) {
        if self.inner.hidden.replace(hidden) == hidden {
            return;
        }
        log::debug!("host visibility changed (hidden: {hidden})");

        let subscribers: Vec<_> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for cb in subscribers {
            if let Ok(mut cb) = cb.try_borrow_mut() {
                (*cb)(hidden);
            }
        }
    }
}

impl Default for WinitHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WinitHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WinitHost")
            .field("pending_timers", &self.inner.timers.borrow().len())
            .field("pending_frames", &self.inner.frames.borrow().len())
            .field("has_window", &self.inner.window.borrow().is_some())
            .field("hidden", &self.inner.hidden.get())
            .finish()
    }
}

impl Clock for WinitHost {
    fn now(&self) -> Duration {
        self.inner.clock.now()
    }
}

impl CoarseTimer for WinitHost {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.inner.next_id());
        let deadline = self.inner.clock.now().saturating_add(delay);
        self.inner.timers.borrow_mut().push((handle, deadline, callback));
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.inner.timers.borrow_mut().retain(|(h, _, _)| *h != handle);
    }
}

impl FrameSource for WinitHost {
    fn request_next_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.inner.next_id());
        self.inner.frames.borrow_mut().push((handle, callback));

        // Without a window the request waits for `attach_window`.
        if let Some(window) = self.inner.window.borrow().as_ref() {
            window.request_redraw();
        }
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.inner.frames.borrow_mut().retain(|(h, _)| *h != handle);
    }
}

impl VisibilitySource for WinitHost {
    fn subscribe(&self, callback: VisibilityCallback) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id());
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(callback))));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.subscribers.borrow_mut().retain(|(s, _)| *s != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::scheduler::{FrameScheduler, SchedulerConfig};

    // These exercise the host without an event loop or a window.

    #[test]
    fn due_timers_fire_and_later_ones_wait() {
        let host = WinitHost::new();
        let fired = Rc::new(Cell::new(0));

        let f = Rc::clone(&fired);
        host.schedule(Duration::ZERO, Box::new(move || f.set(f.get() + 1)));
        let f = Rc::clone(&fired);
        host.schedule(Duration::from_secs(3600), Box::new(move || f.set(f.get() + 1)));

        assert_eq!(host.fire_due_timers(Instant::now()), 1);
        assert_eq!(fired.get(), 1);
        assert!(host.next_deadline().is_some());
    }

    #[test]
    fn frames_wait_for_redraw_without_window() {
        let host = WinitHost::new();
        let fired = Rc::new(Cell::new(false));

        let f = Rc::clone(&fired);
        host.request_next_frame(Box::new(move || f.set(true)));
        assert!(!fired.get());

        assert_eq!(host.deliver_frames(), 1);
        assert!(fired.get());
    }

    #[test]
    fn visibility_emits_only_on_change() {
        let host = WinitHost::new();
        let s = FrameScheduler::new(host.bindings(), SchedulerConfig::default().follow_visibility());
        let pauses = Rc::new(Cell::new(0));
        let p = Rc::clone(&pauses);
        s.on_pause(move || p.set(p.get() + 1));

        host.set_hidden(true);
        host.set_hidden(true);
        assert!(s.is_paused());
        assert_eq!(pauses.get(), 1);

        host.set_hidden(false);
        assert!(!s.is_paused());
    }

    #[test]
    fn scheduler_loop_runs_on_host_primitives() {
        let host = WinitHost::new();
        let s = FrameScheduler::new(
            host.bindings(),
            SchedulerConfig { frame_overhead: Duration::from_secs(1), ..Default::default() },
        );
        let ticks = Rc::new(Cell::new(0));
        let t = Rc::clone(&ticks);
        s.add_tick(move |_| t.set(t.get() + 1));
        s.start();

        // Overhead larger than the interval: zero delay, due immediately.
        assert_eq!(host.fire_due_timers(Instant::now()), 1);
        assert_eq!(ticks.get(), 1);

        assert_eq!(host.deliver_frames(), 1);
        assert!(host.next_deadline().is_some());
    }
}
