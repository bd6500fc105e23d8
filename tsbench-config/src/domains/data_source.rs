//! Point source configuration

use crate::error::ConfigResult;
use crate::validation::{validate_enum_choice, validate_positive, validate_required_string, Validatable};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Use cases the simulator knows how to generate
pub const SIMULATOR_USE_CASES: &[&str] = &["cpu-only"];

/// Where points come from
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DataSourceConfig {
    /// Source kind
    #[serde(rename = "type")]
    pub kind: DataSourceType,

    /// File replay settings, used when `type: file`
    pub file: FileSourceConfig,

    /// Simulator settings, used when `type: simulator`
    pub simulator: SimulatorConfig,
}

/// Point source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceType {
    #[default]
    File,
    Simulator,
}

/// File replay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSourceConfig {
    /// Path of the pre-generated data file, `-` reads standard input
    pub location: String,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            location: "-".to_string(),
        }
    }
}

impl FileSourceConfig {
    /// Whether points are read from standard input
    pub fn is_stdin(&self) -> bool {
        self.location == "-"
    }
}

/// Synthetic data generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Which data set to simulate
    pub use_case: String,

    /// Number of simulated hosts
    pub scale: u64,

    /// Seed for the random number generator
    pub seed: u64,

    /// First timestamp of the simulated window (inclusive)
    pub timestamp_start: DateTime<Utc>,

    /// End of the simulated window (exclusive)
    pub timestamp_end: DateTime<Utc>,

    /// Interval between two readings of the same host
    #[serde(with = "humantime_serde")]
    pub log_interval: Duration,

    /// Stop after this many points, 0 means until the window ends
    pub max_data_points: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            use_case: "cpu-only".to_string(),
            scale: 1,
            seed: 123,
            timestamp_start: Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            timestamp_end: Utc.with_ymd_and_hms(2016, 1, 2, 0, 0, 0).single().unwrap_or_default(),
            log_interval: Duration::from_secs(10),
            max_data_points: 0,
        }
    }
}

impl Validatable for DataSourceConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.kind {
            DataSourceType::File => self.file.validate(),
            DataSourceType::Simulator => self.simulator.validate(),
        }
    }

    fn domain_name(&self) -> &'static str {
        "data_source"
    }
}

impl Validatable for FileSourceConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.location, "location", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "data_source.file"
    }
}

impl Validatable for SimulatorConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_enum_choice(&self.use_case, SIMULATOR_USE_CASES, "use_case", self.domain_name())?;
        validate_positive(self.scale, "scale", self.domain_name())?;

        if self.log_interval.is_zero() {
            return Err(self.validation_error("log_interval must be greater than 0"));
        }

        if self.timestamp_end <= self.timestamp_start {
            return Err(self.validation_error(format!(
                "timestamp_end ({}) must be after timestamp_start ({})",
                self.timestamp_end, self.timestamp_start
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "data_source.simulator"
    }
}
