//! Target-level errors

use thiserror::Error;
use tsbench_config::ConfigError;
use tsbench_interfaces::LoadError;

pub type TargetResult<T> = Result<T, TargetError>;

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("unknown target '{name}' (available: {available})")]
    UnknownTarget { name: String, available: String },

    #[error("target '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl TargetError {
    /// Stage to report on exit
    pub fn stage(&self) -> &'static str {
        match self {
            TargetError::UnknownTarget { .. } | TargetError::AlreadyRegistered(_) | TargetError::Config(_) => {
                "config"
            }
            TargetError::Load(e) => e.stage(),
        }
    }
}
