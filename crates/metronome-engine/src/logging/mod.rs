//! Logging utilities.
//!
//! The scheduler reports through the `log` facade only; this module wires up
//! `env_logger` for binaries that do not bring their own backend.

mod init;

pub use init::{init_logging, LoggingConfig};
