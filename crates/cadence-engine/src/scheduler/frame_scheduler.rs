use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::host::{FrameHandle, HostBindings, SubscriptionId, TimerHandle};
use crate::time::{
    clamp_elapsed,
    clamp_rate,
    coarse_delay,
    fixed_step,
    is_runnable,
    seconds_between,
};

use super::config::SchedulerConfig;
use super::diagnostics::{panic_message, Diagnostic, RegistryKind};
use super::registry::{
    observer,
    tick_listener,
    Detach,
    Observer,
    Registry,
    TickListener,
    Unregister,
};

/// Logical phase of the schedule/tick loop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoopPhase {
    /// Not started, paused, halted, or between a completed tick and its re-arm.
    Idle,
    /// A coarse timer or frame request is pending.
    Scheduling,
    /// The render step is dispatching tick listeners.
    Ticking,
}

/// The host request currently keeping the loop alive.
#[derive(Debug, Copy, Clone)]
enum Pending {
    Timer(TimerHandle),
    Frame(FrameHandle),
}

type DiagnosticSink = Rc<RefCell<dyn FnMut(&Diagnostic)>>;

/// Drives tick listeners at a clamped rate on top of injected host collaborators.
///
/// Each loop iteration is two-phase:
/// 1. a coarse timer approximating `1 / target_fps`, shortened by the
///    configured frame overhead
/// 2. when it fires, the next host frame is requested and the render step
///    runs immediately; the frame callback only re-arms step 1
///
/// At most one iteration is pending at any time. Pausing does not cancel a
/// pending request, so one more tick may still arrive after `pause()`.
///
/// The scheduler is single-threaded. Cloning yields another handle to the
/// same scheduler. Every method may be called from inside a listener.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Rc<Inner>,
}

struct Inner {
    host:   HostBindings,
    config: Cell<SchedulerConfig>,

    target_fps: Cell<f64>,

    running:        Cell<bool>,
    paused:         Cell<bool>,
    paused_by_user: Cell<bool>,
    in_flight:      Cell<bool>,
    hidden:         Cell<bool>,
    disposed:       Cell<bool>,
    phase:          Cell<LoopPhase>,
    pending:        Cell<Option<Pending>>,

    started_at:   Cell<Duration>,
    last_tick_at: Cell<Duration>,
    this_tick_at: Cell<Duration>,
    actual_fps:   Cell<f64>,
    tick_count:   Cell<u64>,

    ticks:   Rc<Registry<dyn FnMut(f64)>>,
    pauses:  Rc<Registry<dyn FnMut()>>,
    resumes: Rc<Registry<dyn FnMut()>>,

    visibility_sub: Cell<Option<SubscriptionId>>,
    sink:           RefCell<Option<DiagnosticSink>>,
    outbox:         RefCell<VecDeque<Diagnostic>>,
    delivering:     Cell<bool>,
}

impl FrameScheduler {
    /// Creates a scheduler bound to `host`.
    ///
    /// Subscribes to the host's visibility signal (if any) for the scheduler's
    /// lifetime; see [`dispose`](Self::dispose). The loop does not run until
    /// [`start`](Self::start).
    pub fn new(host: HostBindings, config: SchedulerConfig) -> Self {
        let now = host.clock.now();
        let inner = Rc::new(Inner {
            host,
            config: Cell::new(config),
            target_fps: Cell::new(config.initial_fps),
            running: Cell::new(false),
            paused: Cell::new(false),
            paused_by_user: Cell::new(false),
            in_flight: Cell::new(false),
            hidden: Cell::new(false),
            disposed: Cell::new(false),
            phase: Cell::new(LoopPhase::Idle),
            pending: Cell::new(None),
            started_at: Cell::new(now),
            last_tick_at: Cell::new(now),
            this_tick_at: Cell::new(now),
            actual_fps: Cell::new(0.0),
            tick_count: Cell::new(0),
            ticks: Rc::new(Registry::new()),
            pauses: Rc::new(Registry::new()),
            resumes: Rc::new(Registry::new()),
            visibility_sub: Cell::new(None),
            sink: RefCell::new(None),
            outbox: RefCell::new(VecDeque::new()),
            delivering: Cell::new(false),
        });

        let scheduler = Self { inner };
        scheduler.set_rate(config.initial_fps);

        if let Some(source) = scheduler.inner.host.visibility.clone() {
            let weak: Weak<Inner> = Rc::downgrade(&scheduler.inner);
            let id = source.subscribe(Box::new(move |hidden| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_visibility(hidden);
                }
            }));
            scheduler.inner.visibility_sub.set(Some(id));
        }

        scheduler
    }

    /// Creates a scheduler with [`SchedulerConfig::default`].
    pub fn with_defaults(host: HostBindings) -> Self {
        Self::new(host, SchedulerConfig::default())
    }

    // ── configuration ─────────────────────────────────────────────────────

    /// Sets the target rate, clamped into `[min_fps, max_fps]` unless the
    /// configuration allows exceeding the range. Never fails.
    ///
    /// A non-positive rate halts the loop at its next re-arm; restart it with a
    /// positive rate followed by `start` or `resume`.
    pub fn set_rate(&self, fps: f64) {
        let cfg = self.inner.config.get();
        let applied = if cfg.allow_exceed_rate_range {
            fps
        } else {
            clamp_rate(fps, cfg.min_fps, cfg.max_fps)
        };

        if applied != fps {
            self.inner.report(Diagnostic::RateClamped {
                requested: fps,
                applied,
            });
        }

        self.inner.target_fps.set(applied);
    }

    pub fn target_fps(&self) -> f64 {
        self.inner.target_fps.get()
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config.get()
    }

    /// Edits the configuration in place.
    ///
    /// Changing the bounds does not re-clamp the current target rate; call
    /// `set_rate` for that.
    pub fn configure<F>(&self, edit: F)
    where
        F: FnOnce(&mut SchedulerConfig),
    {
        let mut cfg = self.inner.config.get();
        edit(&mut cfg);
        self.inner.config.set(cfg);
    }

    /// Installs (or removes) a sink receiving every [`Diagnostic`].
    ///
    /// Diagnostics are logged regardless. Diagnostics raised while the sink
    /// runs (e.g. it calls `set_rate`) are queued and delivered after it
    /// returns. A panicking sink is logged and does not interrupt the caller.
    pub fn set_diagnostic_sink<F>(&self, sink: Option<F>)
    where
        F: FnMut(&Diagnostic) + 'static,
    {
        let sink = sink.map(|f| Rc::new(RefCell::new(f)) as DiagnosticSink);
        *self.inner.sink.borrow_mut() = sink;
    }

    pub fn clear_diagnostic_sink(&self) {
        self.inner.sink.borrow_mut().take();
    }

    // ── run control ───────────────────────────────────────────────────────

    /// Starts the loop, resetting the timing baseline.
    ///
    /// Calling it again while running only resets timestamps; the in-flight
    /// guard keeps a single pending iteration.
    pub fn start(&self) {
        if self.inner.disposed.get() {
            log::warn!("start() ignored on a disposed frame scheduler");
            return;
        }

        let now = self.inner.host.clock.now();
        self.inner.started_at.set(now);
        self.inner.last_tick_at.set(now);
        self.inner.this_tick_at.set(now);
        self.inner.running.set(true);

        log::debug!("frame scheduler started at {} fps", self.inner.target_fps.get());
        self.inner.try_schedule();
    }

    /// Pauses the loop.
    ///
    /// `quiet == false` records a sticky user pause that quiet resumes cannot
    /// lift. Pause observers fire only on an actual transition.
    pub fn pause(&self, quiet: bool) {
        self.inner.pause(quiet);
    }

    /// Resumes the loop.
    ///
    /// `quiet == false` clears the user pause. The transition happens only if
    /// no user pause stands and the scheduler is effectively paused.
    pub fn resume(&self, quiet: bool) {
        self.inner.resume(quiet);
    }

    /// Single entry point for host visibility changes.
    pub fn handle_visibility(&self, hidden: bool) {
        self.inner.handle_visibility(hidden);
    }

    /// Stops the loop for good: unbinds visibility and cancels the pending
    /// host request. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    // ── tick listeners ────────────────────────────────────────────────────

    pub fn add_tick<F>(&self, f: F) -> Unregister
    where
        F: FnMut(f64) + 'static,
    {
        self.add_tick_listener(&tick_listener(f))
    }

    /// Registers a shared listener; keep the `Rc` to remove it with
    /// [`remove_tick`](Self::remove_tick).
    pub fn add_tick_listener(&self, listener: &TickListener) -> Unregister {
        register(&self.inner.ticks, Rc::clone(listener))
    }

    /// Registers `listener` if present. `None` is ignored and returns no handle.
    pub fn try_add_tick(&self, listener: Option<TickListener>) -> Option<Unregister> {
        match listener {
            Some(l) => Some(self.add_tick_listener(&l)),
            None => {
                self.inner.report(Diagnostic::RejectedListener {
                    registry: RegistryKind::Tick,
                });
                None
            }
        }
    }

    pub fn remove_tick(&self, listener: &TickListener) {
        self.inner.ticks.remove_listener(listener);
    }

    pub fn clear_ticks(&self) {
        self.inner.ticks.clear();
    }

    pub fn tick_listener_count(&self) -> usize {
        self.inner.ticks.len()
    }

    // ── pause observers ───────────────────────────────────────────────────

    pub fn on_pause<F>(&self, f: F) -> Unregister
    where
        F: FnMut() + 'static,
    {
        self.on_pause_observer(&observer(f))
    }

    pub fn on_pause_observer(&self, obs: &Observer) -> Unregister {
        register(&self.inner.pauses, Rc::clone(obs))
    }

    pub fn try_on_pause(&self, obs: Option<Observer>) -> Option<Unregister> {
        self.try_observer(&self.inner.pauses, obs, RegistryKind::Pause)
    }

    pub fn remove_pause(&self, obs: &Observer) {
        self.inner.pauses.remove_listener(obs);
    }

    pub fn clear_pause(&self) {
        self.inner.pauses.clear();
    }

    // ── resume observers ──────────────────────────────────────────────────

    pub fn on_resume<F>(&self, f: F) -> Unregister
    where
        F: FnMut() + 'static,
    {
        self.on_resume_observer(&observer(f))
    }

    pub fn on_resume_observer(&self, obs: &Observer) -> Unregister {
        register(&self.inner.resumes, Rc::clone(obs))
    }

    pub fn try_on_resume(&self, obs: Option<Observer>) -> Option<Unregister> {
        self.try_observer(&self.inner.resumes, obs, RegistryKind::Resume)
    }

    pub fn remove_resume(&self, obs: &Observer) {
        self.inner.resumes.remove_listener(obs);
    }

    pub fn clear_resume(&self) {
        self.inner.resumes.clear();
    }

    fn try_observer(
        &self,
        registry: &Rc<Registry<dyn FnMut()>>,
        obs: Option<Observer>,
        kind: RegistryKind,
    ) -> Option<Unregister> {
        let Some(obs) = obs else {
            self.inner.report(Diagnostic::RejectedListener { registry: kind });
            return None;
        };
        Some(register(registry, obs))
    }

    // ── state queries ─────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Effective pause: user pause or a quiet pause not yet lifted.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    pub fn is_paused_by_user(&self) -> bool {
        self.inner.paused_by_user.get()
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.in_flight.get()
    }

    /// Last visibility state reported by the host.
    pub fn is_hidden(&self) -> bool {
        self.inner.hidden.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    pub fn phase(&self) -> LoopPhase {
        self.inner.phase.get()
    }

    /// Clock reading taken by the most recent `start()`.
    pub fn started_at(&self) -> Duration {
        self.inner.started_at.get()
    }

    /// Rate implied by the last measured tick interval, before clamping.
    /// Zero until the first tick.
    pub fn actual_fps(&self) -> f64 {
        self.inner.actual_fps.get()
    }

    /// Ticks dispatched since construction.
    pub fn tick_count(&self) -> u64 {
        self.inner.tick_count.get()
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("target_fps", &self.inner.target_fps.get())
            .field("phase", &self.inner.phase.get())
            .field("running", &self.inner.running.get())
            .field("paused", &self.inner.paused.get())
            .field("paused_by_user", &self.inner.paused_by_user.get())
            .field("in_flight", &self.inner.in_flight.get())
            .field("tick_listeners", &self.inner.ticks.len())
            .finish_non_exhaustive()
    }
}

fn register<F>(registry: &Rc<Registry<F>>, listener: Rc<RefCell<F>>) -> Unregister
where
    F: ?Sized + 'static,
{
    let id = registry.push(listener);
    let target: Rc<dyn Detach> = Rc::clone(registry) as Rc<dyn Detach>;
    Unregister::new(Rc::downgrade(&target), id)
}

impl Inner {
    fn report(&self, diagnostic: Diagnostic) {
        diagnostic.log();

        if self.sink.borrow().is_none() {
            return;
        }
        self.outbox.borrow_mut().push_back(diagnostic);

        // A report from inside the sink is picked up by the outer loop.
        if self.delivering.replace(true) {
            return;
        }

        loop {
            let Some(next) = self.outbox.borrow_mut().pop_front() else {
                break;
            };
            let Some(sink) = self.sink.borrow().clone() else {
                self.outbox.borrow_mut().clear();
                break;
            };
            let Ok(mut sink) = sink.try_borrow_mut() else {
                continue;
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| (*sink)(&next)));
            drop(sink);

            if let Err(payload) = result {
                log::error!("diagnostic sink panicked: {}", panic_message(payload.as_ref()));
            }
        }

        self.delivering.set(false);
    }

    // ── loop ──────────────────────────────────────────────────────────────

    /// `Idle → Scheduling`. Returns whether a new iteration was armed.
    fn try_schedule(self: &Rc<Self>) -> bool {
        if !self.running.get() || self.disposed.get() || self.in_flight.get() || self.paused.get() {
            return false;
        }

        let fps = self.target_fps.get();
        if !is_runnable(fps) {
            self.report(Diagnostic::LoopHalted { target_fps: fps });
            return false;
        }

        let delay = coarse_delay(fps, self.config.get().frame_overhead);
        self.in_flight.set(true);
        self.phase.set(LoopPhase::Scheduling);

        let weak = Rc::downgrade(self);
        let handle = self.host.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timer();
                }
            }),
        );
        self.pending.set(Some(Pending::Timer(handle)));
        true
    }

    /// Coarse timer fired: ask for the next frame, then render right away.
    fn on_timer(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        self.pending.set(None);

        let weak = Rc::downgrade(self);
        let handle = self.host.frames.request_next_frame(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame();
            }
        }));

        // A synchronous frame source may already have re-armed the loop.
        if self.in_flight.get() && self.pending.get().is_none() {
            self.pending.set(Some(Pending::Frame(handle)));
        }

        self.render();
    }

    /// Frame callback: the iteration is complete, try to arm the next one.
    fn on_frame(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        self.in_flight.set(false);
        self.pending.set(None);
        if self.phase.get() != LoopPhase::Ticking {
            self.phase.set(LoopPhase::Idle);
        }
        self.try_schedule();
    }

    fn render(&self) {
        self.phase.set(LoopPhase::Ticking);

        let now = self.host.clock.now();
        let last = self.this_tick_at.replace(now);
        self.last_tick_at.set(last);

        let cfg = self.config.get();
        let target = self.target_fps.get();
        let measured = seconds_between(last, now);

        if measured > 0.0 {
            self.actual_fps.set(1.0 / measured);
        }

        let elapsed = if !cfg.time_based {
            fixed_step(target)
        } else if cfg.allow_exceed_rate_range {
            measured
        } else {
            clamp_elapsed(measured, cfg.min_fps, cfg.max_fps)
        };

        self.tick_count.set(self.tick_count.get() + 1);

        self.ticks.dispatch(
            |listener| listener(elapsed),
            |message| {
                self.report(Diagnostic::ListenerPanicked {
                    registry: RegistryKind::Tick,
                    message,
                })
            },
        );

        let phase = if self.in_flight.get() {
            LoopPhase::Scheduling
        } else {
            LoopPhase::Idle
        };
        self.phase.set(phase);
    }

    // ── pause / resume ────────────────────────────────────────────────────

    fn pause(self: &Rc<Self>, quiet: bool) {
        if !quiet {
            self.paused_by_user.set(true);
        }

        if self.paused.get() {
            return;
        }

        self.paused.set(true);
        log::debug!("frame scheduler paused (quiet: {quiet})");
        self.fire(&self.pauses, RegistryKind::Pause);
    }

    fn resume(self: &Rc<Self>, quiet: bool) {
        if !quiet {
            self.paused_by_user.set(false);
        }

        if self.paused_by_user.get() || !self.paused.get() {
            return;
        }

        self.paused.set(false);
        log::debug!("frame scheduler resumed (quiet: {quiet})");
        self.fire(&self.resumes, RegistryKind::Resume);

        // Keep the paused span out of the next elapsed value.
        let now = self.host.clock.now();
        self.last_tick_at.set(now);
        self.this_tick_at.set(now);

        self.try_schedule();
    }

    fn fire(&self, registry: &Registry<dyn FnMut()>, kind: RegistryKind) {
        registry.dispatch(
            |obs| obs(),
            |message| {
                self.report(Diagnostic::ListenerPanicked {
                    registry: kind,
                    message,
                })
            },
        );
    }

    fn handle_visibility(self: &Rc<Self>, hidden: bool) {
        self.hidden.set(hidden);
        let cfg = self.config.get();

        if hidden {
            if cfg.pause_on_hidden {
                self.pause(true);
            }
        } else if cfg.resume_on_shown {
            self.resume(true);
        }
    }

    // ── teardown ──────────────────────────────────────────────────────────

    fn unbind_visibility(&self) {
        if let (Some(id), Some(source)) = (self.visibility_sub.take(), self.host.visibility.as_ref()) {
            source.unsubscribe(id);
        }
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }

        self.unbind_visibility();

        match self.pending.take() {
            Some(Pending::Timer(handle)) => self.host.timer.cancel(handle),
            Some(Pending::Frame(handle)) => self.host.frames.cancel_frame(handle),
            None => {}
        }

        self.running.set(false);
        self.in_flight.set(false);
        self.phase.set(LoopPhase::Idle);
        log::debug!("frame scheduler disposed");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispose();
    }
}
