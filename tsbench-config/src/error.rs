//! Errors raised while loading configuration

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("cannot read config file: {0}")]
    Read(#[from] std::io::Error),

    /// The config file is not valid YAML for [`TsbenchConfig`](crate::TsbenchConfig)
    #[error("cannot parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `TSBENCH_*` override could not be parsed
    #[error("invalid environment override: {0}")]
    Env(String),

    /// A value is out of range for its domain
    #[error("invalid {domain} config: {message}")]
    Invalid { domain: String, message: String },
}
