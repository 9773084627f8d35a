use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::{
    Clock,
    CoarseTimer,
    FrameCallback,
    FrameHandle,
    FrameSource,
    HostBindings,
    SubscriptionId,
    TimerCallback,
    TimerHandle,
    VisibilityCallback,
    VisibilitySource,
};

/// Deterministic host driven entirely by the caller.
///
/// Nothing happens on its own: time moves only through [`advance`](Self::advance)
/// or [`set_time`](Self::set_time), frame callbacks run only on
/// [`present`](Self::present) (unless auto-present is enabled), and visibility
/// changes only through [`set_hidden`](Self::set_hidden).
///
/// Cloning shares the same underlying host.
#[derive(Clone, Default)]
pub struct ManualHost {
    inner: Rc<ManualState>,
}

#[derive(Default)]
struct ManualState {
    now:            Cell<Duration>,
    next_id:        Cell<u64>,
    timers:         RefCell<Vec<PendingTimer>>,
    frames:         RefCell<Vec<(FrameHandle, FrameCallback)>>,
    subscribers:    RefCell<Vec<(SubscriptionId, Rc<RefCell<VisibilityCallback>>)>>,
    auto_present:   Cell<bool>,
    hidden:         Cell<bool>,
    frame_requests: Cell<u64>,
}

struct PendingTimer {
    handle:   TimerHandle,
    deadline: Duration,
    callback: TimerCallback,
}

impl ManualState {
    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Removes the earliest timer due at or before `now`. Ties fire in arming order.
    fn take_due_timer(&self, now: Duration) -> Option<PendingTimer> {
        let mut timers = self.timers.borrow_mut();
        let idx = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(_, t)| (t.deadline, t.handle.0))
            .map(|(i, _)| i)?;
        Some(timers.remove(idx))
    }
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings that route every collaborator to this host.
    pub fn bindings(&self) -> HostBindings {
        HostBindings {
            clock:      Rc::new(self.clone()),
            timer:      Rc::new(self.clone()),
            frames:     Rc::new(self.clone()),
            visibility: Some(Rc::new(self.clone())),
        }
    }

    /// When enabled, frame requests run their callback synchronously, the way
    /// a host without a native frame concept might.
    pub fn set_auto_present(&self, enabled: bool) {
        self.inner.auto_present.set(enabled);
    }

    /// Sets the clock to an absolute reading. Moving backwards is allowed.
    ///
    /// Does not fire timers.
    pub fn set_time(&self, now: Duration) {
        self.inner.now.set(now);
    }

    /// Moves the clock forward by `by`, then fires every timer that is due,
    /// including timers armed by those callbacks if they are also due.
    ///
    /// Returns the number of timers fired.
    pub fn advance(&self, by: Duration) -> usize {
        let now = self.inner.now.get().saturating_add(by);
        self.inner.now.set(now);

        let mut fired = 0;
        while let Some(timer) = self.inner.take_due_timer(now) {
            (timer.callback)();
            fired += 1;
        }
        fired
    }

    /// Runs all frame callbacks requested so far.
    ///
    /// Callbacks requested while presenting wait for the next call.
    /// Returns the number of callbacks run.
    pub fn present(&self) -> usize {
        let frames: Vec<_> = self.inner.frames.borrow_mut().drain(..).collect();
        let count = frames.len();
        for (_, callback) in frames {
            callback();
        }
        count
    }

    /// `advance(by)` followed by `present()`. Returns the number of timers fired.
    pub fn step(&self, by: Duration) -> usize {
        let fired = self.advance(by);
        self.present();
        fired
    }

    /// Emits a visibility change to every subscriber.
    pub fn set_hidden(&self, hidden: bool) {
        self.inner.hidden.set(hidden);

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

    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.get()
    }

    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn pending_frames(&self) -> usize {
        self.inner.frames.borrow().len()
    }

    /// Total frame requests received, including auto-presented ones.
    pub fn frame_requests(&self) -> u64 {
        self.inner.frame_requests.get()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner.timers.borrow().iter().map(|t| t.deadline).min()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

impl std::fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualHost")
            .field("now", &self.inner.now.get())
            .field("pending_timers", &self.pending_timers())
            .field("pending_frames", &self.pending_frames())
            .field("hidden", &self.inner.hidden.get())
            .finish()
    }
}

impl Clock for ManualHost {
    fn now(&self) -> Duration {
        self.inner.now.get()
    }
}

impl CoarseTimer for ManualHost {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let handle = TimerHandle(self.inner.next_id());
        let deadline = self.inner.now.get().saturating_add(delay);
        self.inner.timers.borrow_mut().push(PendingTimer {
            handle,
            deadline,
            callback,
        });
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.inner.timers.borrow_mut().retain(|t| t.handle != handle);
    }
}

impl FrameSource for ManualHost {
    fn request_next_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.inner.next_id());
        self.inner.frame_requests.set(self.inner.frame_requests.get() + 1);

        if self.inner.auto_present.get() {
            callback();
        } else {
            self.inner.frames.borrow_mut().push((handle, callback));
        }
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.inner.frames.borrow_mut().retain(|(h, _)| *h != handle);
    }
}

impl VisibilitySource for ManualHost {
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

    fn ms(v: u64) -> Duration { Duration::from_millis(v) }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Box<dyn FnOnce()>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let make = move || {
            let c = Rc::clone(&c);
            Box::new(move || c.set(c.get() + 1)) as Box<dyn FnOnce()>
        };
        (count, make)
    }

    // ── timers ────────────────────────────────────────────────────────────

    #[test]
    fn timer_fires_once_when_due() {
        let host = ManualHost::new();
        let (count, make) = counter();
        host.schedule(ms(10), make());

        assert_eq!(host.advance(ms(9)), 0);
        assert_eq!(host.advance(ms(1)), 1);
        assert_eq!(host.advance(ms(100)), 0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let host = ManualHost::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, delay) in [("b", 20), ("a", 10), ("c", 20)] {
            let o = Rc::clone(&order);
            host.schedule(ms(delay), Box::new(move || o.borrow_mut().push(label)));
        }

        host.advance(ms(50));
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn zero_delay_timer_armed_by_callback_fires_in_same_advance() {
        let host = ManualHost::new();
        let (count, make) = counter();

        let h = host.clone();
        let inner = make();
        host.schedule(ms(5), Box::new(move || {
            h.schedule(Duration::ZERO, inner);
        }));

        assert_eq!(host.advance(ms(5)), 2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let host = ManualHost::new();
        let (count, make) = counter();
        let handle = host.schedule(ms(10), make());
        host.cancel(handle);

        host.advance(ms(20));
        assert_eq!(count.get(), 0);
    }

    // ── frames ────────────────────────────────────────────────────────────

    #[test]
    fn frames_wait_for_present() {
        let host = ManualHost::new();
        let (count, make) = counter();
        host.request_next_frame(make());

        assert_eq!(host.pending_frames(), 1);
        assert_eq!(count.get(), 0);
        assert_eq!(host.present(), 1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn auto_present_runs_synchronously() {
        let host = ManualHost::new();
        host.set_auto_present(true);
        let (count, make) = counter();
        host.request_next_frame(make());

        assert_eq!(count.get(), 1);
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(host.frame_requests(), 1);
    }

    // ── clock ─────────────────────────────────────────────────────────────

    #[test]
    fn set_time_can_move_backwards() {
        let host = ManualHost::new();
        host.advance(ms(100));
        host.set_time(ms(40));
        assert_eq!(Clock::now(&host), ms(40));
    }

    // ── visibility ────────────────────────────────────────────────────────

    #[test]
    fn visibility_reaches_subscribers_until_unsubscribed() {
        let host = ManualHost::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&seen);
        let id = host.subscribe(Box::new(move |hidden| s.borrow_mut().push(hidden)));

        host.set_hidden(true);
        host.set_hidden(false);
        host.unsubscribe(id);
        host.set_hidden(true);

        assert_eq!(*seen.borrow(), vec![true, false]);
        assert_eq!(host.subscriber_count(), 0);
    }
}
