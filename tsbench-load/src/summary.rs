//! End-of-run summary

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tsbench_resilience::BackoffSummary;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub workers: usize,
    pub rows: u64,
    pub metrics: u64,
    pub batches: u64,
    pub points_read: u64,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub rows_per_sec: f64,
    pub metrics_per_sec: f64,
    #[serde(with = "humantime_serde")]
    pub total_backoff: Duration,
    pub worker_backoffs: Vec<BackoffSummary>,
    /// The run was stopped before the source was exhausted
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(workers: usize, rows: u64, metrics: u64, batches: u64, elapsed: Duration) -> Self {
        Self {
            workers,
            rows,
            metrics,
            batches,
            elapsed,
            rows_per_sec: rate(rows, elapsed),
            metrics_per_sec: rate(metrics, elapsed),
            ..Default::default()
        }
    }

    pub fn with_points_read(mut self, points_read: u64) -> Self {
        self.points_read = points_read;
        self
    }

    /// Attach per-worker backoff totals, sorted by worker
    pub fn with_backoffs(mut self, mut backoffs: Vec<BackoffSummary>) -> Self {
        backoffs.sort_by_key(|b| b.worker);
        self.total_backoff = backoffs.iter().map(|b| b.total).sum();
        self.worker_backoffs = backoffs;
        self
    }

    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }
}

/// Per-second rate; zero for an empty interval
pub(crate) fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs_f64();
        writeln!(
            f,
            "loaded {} metrics in {:.3}sec with {} workers (mean rate {:.2} metrics/sec)",
            self.metrics, secs, self.workers, self.metrics_per_sec
        )?;
        write!(
            f,
            "loaded {} rows in {:.3}sec with {} workers (mean rate {:.2} rows/sec)",
            self.rows, secs, self.workers, self.rows_per_sec
        )?;
        if !self.total_backoff.is_zero() {
            write!(f, "\nspent {:.2}sec backing off", self.total_backoff.as_secs_f64())?;
        }
        if self.cancelled {
            write!(f, "\nrun was cancelled before the source was exhausted")?;
        }
        Ok(())
    }
}
