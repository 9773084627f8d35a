//! Time subsystem.
//!
//! Clock abstraction plus the pure rate/interval arithmetic used by the
//! scheduler. Nothing here touches the host event loop, so all of it is
//! testable without one.

mod clock;
mod rate;

pub use clock::{seconds_between, Clock, SystemClock};
pub use rate::{
    clamp_elapsed,
    clamp_rate,
    coarse_delay,
    fixed_step,
    is_runnable,
    HOST_FRAME_OVERHEAD,
};
