//! Logging setup.
//!
//! The engine itself only uses the `log` facade; this module installs
//! `env_logger` for binaries that want the default backend.

mod init;

pub use init::{init_logging, LoggingConfig};
