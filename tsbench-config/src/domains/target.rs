//! Backend target configuration

use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Write consistency levels accepted by InfluxDB-style endpoints
pub const CONSISTENCY_CHOICES: &[&str] = &["one", "quorum", "any", "all"];

/// Which backend to load and how to talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Registered target name (`influx`, `victoriametrics`, `prometheus`)
    pub name: String,

    /// Backend endpoints, assigned to workers round-robin
    pub urls: Vec<String>,

    /// Override for the path batches are posted to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_path: Option<String>,

    /// Sleep between resends of a batch the backend pushed back on
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,

    /// Compress request bodies with gzip
    pub gzip: bool,

    /// Write consistency level
    pub consistency: String,

    /// Replication factor used when creating the database
    pub replication_factor: u32,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Client-side rate limiting
    pub limiter: LimiterConfig,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: "influx".to_string(),
            urls: vec!["http://localhost:8086".to_string()],
            write_path: None,
            backoff: Duration::from_secs(1),
            gzip: true,
            consistency: "all".to_string(),
            replication_factor: 1,
            timeout: Duration::from_secs(30),
            limiter: LimiterConfig::default(),
        }
    }
}

impl TargetConfig {
    /// Endpoint used by the given worker
    pub fn url_for_worker(&self, worker: usize) -> Option<&str> {
        if self.urls.is_empty() {
            return None;
        }
        Some(self.urls[worker % self.urls.len()].as_str())
    }
}

/// Token bucket limiter keyed on metric count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Enable the limiter
    pub enabled: bool,

    /// Sustained metrics per second
    pub max_rate: f64,

    /// Burst size in metrics
    pub bucket_size: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_rate: 100_000.0,
            bucket_size: 10_000,
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.name, "name", self.domain_name())?;

        if self.urls.is_empty() {
            return Err(self.validation_error("At least one url must be configured"));
        }
        for url in &self.urls {
            validate_url(url, "urls", self.domain_name())?;
        }

        if let Some(path) = &self.write_path {
            if !path.starts_with('/') {
                return Err(self.validation_error(format!("write_path must start with '/', got '{}'", path)));
            }
        }

        if self.backoff.is_zero() {
            return Err(self.validation_error("backoff must be greater than 0"));
        }
        if self.timeout.is_zero() {
            return Err(self.validation_error("timeout must be greater than 0"));
        }

        validate_enum_choice(&self.consistency, CONSISTENCY_CHOICES, "consistency", self.domain_name())?;
        validate_positive(self.replication_factor, "replication_factor", self.domain_name())?;

        self.limiter.validate()
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

impl Validatable for LimiterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.enabled {
            validate_positive(self.max_rate, "max_rate", self.domain_name())?;
            validate_positive(self.bucket_size, "bucket_size", self.domain_name())?;
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target.limiter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_config_defaults() {
        let config = TargetConfig::default();
        assert_eq!(config.name, "influx");
        assert_eq!(config.backoff, Duration::from_secs(1));
        assert!(config.gzip);
        assert!(!config.limiter.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_url_for_worker_round_robin() {
        let config = TargetConfig {
            urls: vec!["http://a:8086".to_string(), "http://b:8086".to_string()],
            ..Default::default()
        };
        assert_eq!(config.url_for_worker(0), Some("http://a:8086"));
        assert_eq!(config.url_for_worker(1), Some("http://b:8086"));
        assert_eq!(config.url_for_worker(2), Some("http://a:8086"));

        let empty = TargetConfig {
            urls: Vec::new(),
            ..Default::default()
        };
        assert_eq!(empty.url_for_worker(0), None);
    }

    #[test]
    fn test_target_config_validation() {
        let mut config = TargetConfig::default();
        config.urls.clear();
        assert!(config.validate().is_err());

        config.urls = vec!["localhost:8086".to_string()];
        assert!(config.validate().is_err());

        config.urls = vec!["http://localhost:8086".to_string()];
        config.consistency = "some".to_string();
        assert!(config.validate().is_err());

        config.consistency = "one".to_string();
        config.write_path = Some("api/v1/import".to_string());
        assert!(config.validate().is_err());

        config.write_path = Some("/api/v1/import/prometheus".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_limiter_validation() {
        let mut limiter = LimiterConfig {
            enabled: true,
            max_rate: 0.0,
            bucket_size: 10,
        };
        assert!(limiter.validate().is_err());

        limiter.max_rate = 500.0;
        assert!(limiter.validate().is_ok());

        limiter.enabled = false;
        limiter.bucket_size = 0;
        assert!(limiter.validate().is_ok());
    }

    #[test]
    fn test_target_config_from_yaml() {
        let yaml = r#"
name: victoriametrics
urls:
  - http://vm-1:8428
  - http://vm-2:8428
backoff: 250ms
gzip: false
limiter:
  enabled: true
  max_rate: 50000
  bucket_size: 5000
"#;
        let config: TargetConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "victoriametrics");
        assert_eq!(config.urls.len(), 2);
        assert_eq!(config.backoff, Duration::from_millis(250));
        assert!(!config.gzip);
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.bucket_size, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_omitted_fields_keep_defaults() {
        let config: TargetConfig = serde_yaml::from_str("name: influx\n").unwrap();
        assert!(config.gzip);
        assert!(!config.limiter.enabled);
        assert_eq!(config.consistency, "all");
    }
}
