//! Cadence engine crate.
//!
//! A single-threaded, rate-limited frame scheduler. Each loop iteration waits
//! a coarse timer delay derived from the target FPS, then requests the next
//! display frame and delivers the elapsed time to registered tick listeners.
//! Host facilities (clock, timer, frame source, visibility) are injected
//! through [`host::HostBindings`]; [`window::WinitHost`] provides them from a
//! winit event loop and [`host::ManualHost`] drives them by hand.

pub mod default_scheduler;
pub mod host;
pub mod logging;
pub mod scheduler;
pub mod time;
pub mod window;

pub use scheduler::{FrameScheduler, SchedulerConfig};
