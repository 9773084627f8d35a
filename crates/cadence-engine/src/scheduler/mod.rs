//! Frame scheduler.
//!
//! [`FrameScheduler`] owns three listener registries (ticks, pause, resume),
//! the rate configuration, and the run/pause state machine. Host interaction
//! goes exclusively through [`crate::host::HostBindings`].
//!
//! Pause and resume come in two flavours:
//! - loud (`quiet == false`): explicit user intent, sticky
//! - quiet (`quiet == true`): visibility-driven, never overrides a loud pause

mod config;
mod diagnostics;
mod frame_scheduler;
mod registry;

pub use config::SchedulerConfig;
pub use diagnostics::{Diagnostic, RegistryKind};
pub use frame_scheduler::{FrameScheduler, LoopPhase};
pub use registry::{observer, tick_listener, Observer, TickListener, Unregister};
