//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window and drives a [`WinitHost`] from them.

mod host;
mod runtime;

pub use host::WinitHost;
pub use runtime::{Runtime, RuntimeConfig};
