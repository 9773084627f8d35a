use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use super::diagnostics::panic_message;

/// Shared per-frame callback. Receives the elapsed time in seconds.
///
/// Keep a clone to remove the listener later with `remove_tick`.
pub type TickListener = Rc<RefCell<dyn FnMut(f64)>>;

/// Shared pause/resume observer.
pub type Observer = Rc<RefCell<dyn FnMut()>>;

/// Wraps a closure as a [`TickListener`].
pub fn tick_listener<F>(f: F) -> TickListener
where
    F: FnMut(f64) + 'static,
{
    Rc::new(RefCell::new(f))
}

/// Wraps a closure as an [`Observer`].
pub fn observer<F>(f: F) -> Observer
where
    F: FnMut() + 'static,
{
    Rc::new(RefCell::new(f))
}

/// Identity of one registration. Registering the same listener twice yields
/// two ids.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct ListenerId(u64);

struct Entry<F: ?Sized> {
    id:       ListenerId,
    listener: Rc<RefCell<F>>,
    /// Cleared on removal; shared with dispatch snapshots.
    live:     Rc<Cell<bool>>,
}

impl<F: ?Sized> Entry<F> {
    fn retire(self) {
        self.live.set(false);
    }
}

/// Ordered listener list with physical removal.
///
/// Dispatch iterates a snapshot, so listeners may add, remove or clear during
/// their own invocation:
/// - entries added during a dispatch run from the next dispatch on
/// - entries removed (or cleared) during a dispatch are skipped if not yet reached
pub(crate) struct Registry<F: ?Sized> {
    entries: RefCell<Vec<Entry<F>>>,
    next_id: Cell<u64>,
}

impl<F: ?Sized> Registry<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub(crate) fn push(&self, listener: Rc<RefCell<F>>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            listener,
            live: Rc::new(Cell::new(true)),
        });
        id
    }

    pub(crate) fn remove_id(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|e| e.id == id) {
            Some(idx) => {
                entries.remove(idx).retire();
                true
            }
            None => false,
        }
    }

    /// Removes the first registration of `listener` (pointer identity).
    pub(crate) fn remove_listener(&self, listener: &Rc<RefCell<F>>) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|e| Rc::ptr_eq(&e.listener, listener)) {
            Some(idx) => {
                entries.remove(idx).retire();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self) {
        let removed: Vec<_> = self.entries.borrow_mut().drain(..).collect();
        for entry in removed {
            entry.retire();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Invokes every listener of the current snapshot in insertion order.
    ///
    /// A panicking listener is reported through `on_panic` and the dispatch
    /// moves on. A listener already running further up the stack is skipped.
    pub(crate) fn dispatch<C, P>(&self, mut invoke: C, mut on_panic: P)
    where
        C: FnMut(&mut F),
        P: FnMut(String),
    {
        let snapshot: Vec<(Rc<Cell<bool>>, Rc<RefCell<F>>)> = self
            .entries
            .borrow()
            .iter()
            .map(|e| (Rc::clone(&e.live), Rc::clone(&e.listener)))
            .collect();

        for (live, listener) in snapshot {
            if !live.get() {
                continue;
            }

            let Ok(mut f) = listener.try_borrow_mut() else {
                continue;
            };

            let result = panic::catch_unwind(AssertUnwindSafe(|| invoke(&mut *f)));
            drop(f);

            if let Err(payload) = result {
                on_panic(panic_message(payload.as_ref()));
            }
        }
    }
}

/// Object-safe removal used by [`Unregister`] across registry types.
pub(crate) trait Detach {
    fn detach(&self, id: ListenerId) -> bool;
}

impl<F: ?Sized> Detach for Registry<F> {
    fn detach(&self, id: ListenerId) -> bool {
        self.remove_id(id)
    }
}

/// Removes one registration when called.
///
/// Idempotent: later calls find nothing and return `false`. Dropping the
/// handle does not unregister.
pub struct Unregister {
    target: Weak<dyn Detach>,
    id:     ListenerId,
}

impl Unregister {
    pub(crate) fn new(target: Weak<dyn Detach>, id: ListenerId) -> Self {
        Self { target, id }
    }

    /// Returns `true` if this call removed the registration.
    pub fn unregister(&self) -> bool {
        match self.target.upgrade() {
            Some(registry) => registry.detach(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Unregister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unregister").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recorder(log: &Log, label: &'static str) -> Observer {
        let log = Rc::clone(log);
        observer(move || log.borrow_mut().push(label))
    }

    fn fire(reg: &Registry<dyn FnMut()>) -> Vec<String> {
        let mut panics = Vec::new();
        reg.dispatch(|f| f(), |msg| panics.push(msg));
        panics
    }

    // ── ordering / identity ───────────────────────────────────────────────

    #[test]
    fn dispatch_in_insertion_order_with_duplicates() {
        let log: Log = Rc::default();
        let reg: Registry<dyn FnMut()> = Registry::new();
        let a = recorder(&log, "a");
        reg.push(Rc::clone(&a));
        reg.push(recorder(&log, "b"));
        reg.push(Rc::clone(&a));

        fire(&reg);
        assert_eq!(*log.borrow(), vec!["a", "b", "a"]);
    }

    #[test]
    fn remove_listener_removes_first_occurrence_only() {
        let log: Log = Rc::default();
        let reg: Registry<dyn FnMut()> = Registry::new();
        let a = recorder(&log, "a");
        reg.push(Rc::clone(&a));
        reg.push(Rc::clone(&a));

        assert!(reg.remove_listener(&a));
        assert_eq!(reg.len(), 1);
        assert!(reg.remove_listener(&a));
        assert!(!reg.remove_listener(&a));
    }

    #[test]
    fn unregister_is_idempotent() {
        let reg: Rc<Registry<dyn FnMut()>> = Rc::new(Registry::new());
        let id = reg.push(observer(|| {}));
        let target: Rc<dyn Detach> = reg.clone();
        let handle = Unregister::new(Rc::downgrade(&target), id);

        assert!(handle.unregister());
        assert!(!handle.unregister());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn unregister_after_registry_dropped() {
        let reg: Rc<Registry<dyn FnMut()>> = Rc::new(Registry::new());
        let id = reg.push(observer(|| {}));
        let target: Rc<dyn Detach> = reg;
        let handle = Unregister::new(Rc::downgrade(&target), id);
        drop(target);

        assert!(!handle.unregister());
    }

    // ── mutation during dispatch ──────────────────────────────────────────

    #[test]
    fn removal_of_later_entry_during_dispatch_skips_it() {
        let log: Log = Rc::default();
        let reg: Rc<Registry<dyn FnMut()>> = Rc::new(Registry::new());
        let b = recorder(&log, "b");

        let r = Rc::clone(&reg);
        let b2 = Rc::clone(&b);
        reg.push(observer(move || {
            r.remove_listener(&b2);
        }));
        reg.push(b);

        fire(&reg);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn addition_during_dispatch_waits_for_next_dispatch() {
        let log: Log = Rc::default();
        let reg: Rc<Registry<dyn FnMut()>> = Rc::new(Registry::new());

        let r = Rc::clone(&reg);
        let l = Rc::clone(&log);
        let mut added = false;
        reg.push(observer(move || {
            if !added {
                r.push(recorder(&l, "late"));
                added = true;
            }
        }));

        fire(&reg);
        assert!(log.borrow().is_empty());
        fire(&reg);
        assert_eq!(*log.borrow(), vec!["late"]);
    }

    #[test]
    fn removed_then_readded_entry_waits_for_next_dispatch() {
        let log: Log = Rc::default();
        let reg: Rc<Registry<dyn FnMut()>> = Rc::new(Registry::new());
        let b = recorder(&log, "b");

        let r = Rc::clone(&reg);
        let b2 = Rc::clone(&b);
        let mut swapped = false;
        reg.push(observer(move || {
            if !swapped {
                r.remove_listener(&b2);
                r.push(Rc::clone(&b2));
                swapped = true;
            }
        }));
        reg.push(b);

        fire(&reg);
        assert!(log.borrow().is_empty());
        assert_eq!(reg.len(), 2);

        fire(&reg);
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn clear_during_dispatch_finishes_early() {
        let log: Log = Rc::default();
        let reg: Rc<Registry<dyn FnMut()>> = Rc::new(Registry::new());

        let r = Rc::clone(&reg);
        reg.push(observer(move || r.clear()));
        reg.push(recorder(&log, "never"));

        fire(&reg);
        assert!(log.borrow().is_empty());
        assert_eq!(reg.len(), 0);
    }

    // ── panics ────────────────────────────────────────────────────────────

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let log: Log = Rc::default();
        let reg: Registry<dyn FnMut()> = Registry::new();
        reg.push(observer(|| panic!("listener failed")));
        reg.push(recorder(&log, "after"));

        let panics = fire(&reg);
        assert_eq!(panics, vec!["listener failed".to_string()]);
        assert_eq!(*log.borrow(), vec!["after"]);

        // The panicking listener's borrow was released; it runs again next time.
        let panics = fire(&reg);
        assert_eq!(panics.len(), 1);
    }
}
