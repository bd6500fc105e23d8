//! Configuration loading and environment variable handling

use crate::domains::TsbenchConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "TSBENCH".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TsbenchConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: TsbenchConfig = serde_yaml::from_str(&content)?;

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<TsbenchConfig> {
        let mut config = TsbenchConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TsbenchConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut TsbenchConfig) -> ConfigResult<()> {
        self.apply_runner_overrides(&mut config.runner)?;
        self.apply_data_source_overrides(&mut config.data_source)?;
        self.apply_target_overrides(&mut config.target)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply runner config overrides
    fn apply_runner_overrides(&self, config: &mut crate::domains::runner::RunnerConfig) -> ConfigResult<()> {
        if let Ok(db_name) = self.get_env_var("DB_NAME") {
            config.db_name = db_name;
        }

        if let Some(batch_size) = self.parse_env_var("BATCH_SIZE")? {
            config.batch_size = batch_size;
        }

        if let Some(workers) = self.parse_env_var("WORKERS")? {
            config.workers = workers;
        }

        if let Some(partitions) = self.parse_env_var("PARTITIONS")? {
            config.partitions = partitions;
        }

        if let Some(limit) = self.parse_env_var("LIMIT")? {
            config.limit = limit;
        }

        if let Some(hash_workers) = self.parse_env_var("HASH_WORKERS")? {
            config.hash_workers = hash_workers;
        }

        if let Some(do_load) = self.parse_env_var("DO_LOAD")? {
            config.do_load = do_load;
        }

        if let Some(do_create_db) = self.parse_env_var("DO_CREATE_DB")? {
            config.do_create_db = do_create_db;
        }

        if let Some(period) = self.duration_env_var("REPORTING_PERIOD")? {
            config.reporting_period = period;
        }

        if let Some(max_run_time) = self.duration_env_var("MAX_RUN_TIME")? {
            config.max_run_time = Some(max_run_time);
        }

        Ok(())
    }

    /// Apply data source config overrides
    fn apply_data_source_overrides(
        &self,
        config: &mut crate::domains::data_source::DataSourceConfig,
    ) -> ConfigResult<()> {
        if let Ok(kind) = self.get_env_var("DATA_SOURCE") {
            config.kind = match kind.to_lowercase().as_str() {
                "file" => crate::domains::data_source::DataSourceType::File,
                "simulator" => crate::domains::data_source::DataSourceType::Simulator,
                _ => return Err(ConfigError::Env(format!("Invalid DATA_SOURCE: {}", kind))),
            };
        }

        if let Ok(location) = self.get_env_var("FILE") {
            config.file.location = location;
        }

        if let Some(scale) = self.parse_env_var("SCALE")? {
            config.simulator.scale = scale;
        }

        if let Some(seed) = self.parse_env_var("SEED")? {
            config.simulator.seed = seed;
        }

        Ok(())
    }

    /// Apply target config overrides
    fn apply_target_overrides(&self, config: &mut crate::domains::target::TargetConfig) -> ConfigResult<()> {
        if let Ok(name) = self.get_env_var("TARGET") {
            config.name = name;
        }

        if let Ok(urls) = self.get_env_var("URLS") {
            config.urls = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(backoff) = self.duration_env_var("BACKOFF")? {
            config.backoff = backoff;
        }

        if let Some(gzip) = self.parse_env_var("GZIP")? {
            config.gzip = gzip;
        }

        if let Some(max_rate) = self.parse_env_var::<f64>("LIMITER_MAX_RATE")? {
            config.limiter.enabled = true;
            config.limiter.max_rate = max_rate;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::Env(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::Env(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Parse an optional prefixed environment variable
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| ConfigError::Env(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Parse an optional prefixed environment variable holding a humantime duration
    fn duration_env_var(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(value) => humantime_serde::re::humantime::parse_duration(value.trim())
                .map(Some)
                .map_err(|e| ConfigError::Env(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
