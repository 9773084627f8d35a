//! Per-thread default scheduler.
//!
//! Nothing is created implicitly. The application constructs a
//! [`FrameScheduler`] with its host bindings and installs it here, early in
//! startup and before any code calls [`with`]. Schedulers are single-threaded,
//! so each thread has its own slot.

use std::cell::RefCell;

use crate::scheduler::FrameScheduler;

thread_local! {
    static DEFAULT: RefCell<Option<FrameScheduler>> = const { RefCell::new(None) };
}

/// Installs `scheduler` as this thread's default, returning the previous one.
pub fn install(scheduler: FrameScheduler) -> Option<FrameScheduler> {
    DEFAULT.with(|slot| slot.borrow_mut().replace(scheduler))
}

/// Removes and returns this thread's default scheduler.
pub fn uninstall() -> Option<FrameScheduler> {
    DEFAULT.with(|slot| slot.borrow_mut().take())
}

pub fn is_installed() -> bool {
    DEFAULT.with(|slot| slot.borrow().is_some())
}

/// Runs `f` with the default scheduler, or returns `None` if none is installed.
///
/// The slot is not borrowed while `f` runs, so `f` may install or uninstall.
pub fn with<R>(f: impl FnOnce(&FrameScheduler) -> R) -> Option<R> {
    let scheduler = DEFAULT.with(|slot| slot.borrow().clone())?;
    Some(f(&scheduler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;

    #[test]
    fn with_returns_none_until_installed() {
        uninstall();
        assert!(with(|s| s.target_fps()).is_none());

        let host = ManualHost::new();
        assert!(install(FrameScheduler::with_defaults(host.bindings())).is_none());
        assert!(is_installed());
        assert_eq!(with(|s| s.target_fps()), Some(60.0));

        let previous = uninstall();
        assert!(previous.is_some());
        assert!(!is_installed());
    }

    #[test]
    fn install_replaces_previous() {
        let host = ManualHost::new();
        uninstall();
        install(FrameScheduler::with_defaults(host.bindings()));

        let replacement = FrameScheduler::with_defaults(host.bindings());
        replacement.set_rate(30.0);
        let old = install(replacement);

        assert_eq!(old.map(|s| s.target_fps()), Some(60.0));
        assert_eq!(with(|s| s.target_fps()), Some(30.0));

        // The callback may swap the default out from under itself.
        with(|_| uninstall());
        assert!(!is_installed());
    }
}
