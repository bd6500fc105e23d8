//! Domain-specific configuration modules

pub mod data_source;
pub mod logging;
pub mod runner;
pub mod target;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main tsbench configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TsbenchConfig {
    /// Scheduler, worker pool and run lifecycle
    #[serde(default)]
    pub runner: runner::RunnerConfig,

    /// Where points come from
    #[serde(default)]
    pub data_source: data_source::DataSourceConfig,

    /// Backend the points are loaded into
    #[serde(default)]
    pub target: target::TargetConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl TsbenchConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.runner.validate()?;
        self.data_source.validate()?;
        self.target.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = TsbenchConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TsbenchConfig::default();
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = TsbenchConfig::generate_sample();
        assert!(sample.contains("runner:"));
        assert!(sample.contains("target:"));

        let parsed: TsbenchConfig = serde_yaml::from_str(&sample).unwrap();
        assert_eq!(parsed.runner.batch_size, 10_000);
        assert_eq!(parsed.target.name, "influx");
        assert!(parsed.validate_all().is_ok());
    }
}
