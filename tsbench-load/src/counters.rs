//! Run-wide throughput counters
//!
//! Workers add to these after every batch; the reporter and the final
//! summary read them. Plain relaxed atomics are enough since nothing
//! orders other memory through them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tsbench_interfaces::BatchCounts;
use tsbench_resilience::BackoffGauge;

#[derive(Debug, Default)]
pub struct RunCounters {
    rows: AtomicU64,
    metrics: AtomicU64,
    batches: AtomicU64,
    active_workers: AtomicUsize,
    backoff: Arc<BackoffGauge>,
}

/// Point-in-time copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub rows: u64,
    pub metrics: u64,
    pub batches: u64,
    pub active_workers: usize,
    pub backing_off_workers: usize,
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one processed batch
    pub fn add(&self, counts: BatchCounts) {
        self.rows.fetch_add(counts.rows, Ordering::Relaxed);
        self.metrics.fetch_add(counts.metrics, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> u64 {
        self.metrics.load(Ordering::Relaxed)
    }

    /// Live backoff time shared with every worker's observer
    pub fn backoff_gauge(&self) -> Arc<BackoffGauge> {
        Arc::clone(&self.backoff)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            rows: self.rows.load(Ordering::Relaxed),
            metrics: self.metrics.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::Relaxed),
            backing_off_workers: self.backoff.backing_off(),
            backoff: self.backoff.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_accumulates() {
        let counters = RunCounters::new();
        counters.add(BatchCounts { metrics: 10, rows: 2 });
        counters.add(BatchCounts { metrics: 5, rows: 1 });

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.rows, 3);
        assert_eq!(snapshot.metrics, 15);
        assert_eq!(snapshot.batches, 2);
        assert_eq!(snapshot.backoff, Duration::ZERO);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let counters = Arc::new(RunCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.add(BatchCounts { metrics: 3, rows: 1 });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.rows(), 8000);
        assert_eq!(counters.metrics(), 24000);
    }

    #[test]
    fn test_active_workers() {
        let counters = RunCounters::new();
        counters.worker_started();
        counters.worker_started();
        counters.worker_finished();
        assert_eq!(counters.snapshot().active_workers, 1);
    }
}
