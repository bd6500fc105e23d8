//! Domain-driven configuration management for tsbench
//!
//! Configuration is split by functional domain (runner, data source, target,
//! logging), loaded from YAML, overridden from `TSBENCH_*` environment
//! variables and validated per domain before a run starts.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    data_source::{DataSourceConfig, DataSourceType, FileSourceConfig, SimulatorConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    runner::RunnerConfig,
    target::{LimiterConfig, TargetConfig},
    TsbenchConfig,
};
