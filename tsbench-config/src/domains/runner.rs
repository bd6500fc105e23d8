//! Load runner configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the scheduler, the worker pool and the run lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Name of the database to load into
    pub db_name: String,

    /// Number of points per batch
    pub batch_size: usize,

    /// Number of concurrent workers
    pub workers: usize,

    /// Number of partitions points are hashed into
    pub partitions: usize,

    /// Maximum number of points to read, 0 means unlimited
    pub limit: u64,

    /// Give each worker a dedicated queue, one partition per worker
    pub hash_workers: bool,

    /// Send batches to the backend; when false the run is a dry run
    pub do_load: bool,

    /// Create the database before loading
    pub do_create_db: bool,

    /// Abort when the database already exists instead of dropping it
    pub do_abort_on_exist: bool,

    /// Interval between throughput reports, zero disables reporting
    #[serde(with = "humantime_serde")]
    pub reporting_period: Duration,

    /// Stop reading points after this long
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub max_run_time: Option<Duration>,

    /// How long in-flight batches may drain after a stop request before
    /// workers are cancelled
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// Capacity of each work queue, zero picks one from the worker count
    pub channel_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            db_name: "benchmark".to_string(),
            batch_size: 10_000,
            workers: num_cpus::get(),
            partitions: 1,
            limit: 0,
            hash_workers: false,
            do_load: true,
            do_create_db: true,
            do_abort_on_exist: false,
            reporting_period: Duration::from_secs(10),
            max_run_time: None,
            shutdown_grace: Duration::from_secs(30),
            channel_capacity: 0,
        }
    }
}

impl RunnerConfig {
    /// Number of partitions the indexer hashes into
    pub fn effective_partitions(&self) -> usize {
        if self.hash_workers {
            self.workers
        } else {
            self.partitions.max(1)
        }
    }

    /// Capacity of each queue the scheduler feeds
    pub fn effective_channel_capacity(&self) -> usize {
        match (self.channel_capacity, self.hash_workers) {
            (0, true) => 1,
            (0, false) => self.workers.max(1),
            (capacity, _) => capacity,
        }
    }

    /// Maximum number of points to read, if any
    pub fn point_limit(&self) -> Option<u64> {
        (self.limit > 0).then_some(self.limit)
    }
}

impl Validatable for RunnerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.db_name, "db_name", self.domain_name())?;
        validate_positive(self.batch_size, "batch_size", self.domain_name())?;
        validate_positive(self.workers, "workers", self.domain_name())?;
        validate_positive(self.partitions, "partitions", self.domain_name())?;

        if self.hash_workers && self.partitions > 1 && self.partitions != self.workers {
            log::warn!(
                "hash_workers is set: using {} partitions (one per worker) instead of {}",
                self.workers,
                self.partitions
            );
        }

        if let Some(max_run_time) = self.max_run_time {
            if max_run_time.is_zero() {
                return Err(self.validation_error("max_run_time must be greater than 0"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "runner"
    }
}
