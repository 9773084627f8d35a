//! Logging utilities.
//!
//! The library itself only emits through the `log` facade. This module
//! offers a one-call `env_logger` setup for binaries and tests.

mod init;

pub use init::{init_logging, LoggingConfig, LOG_ENV_VAR};
