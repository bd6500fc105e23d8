//! Logging setup for tsbench
//!
//! Installs a global `tracing` subscriber. Records emitted through the `log`
//! crate (the config and resilience crates use it) are forwarded to the same
//! subscriber.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
