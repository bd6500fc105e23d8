//! Dispatch scheduler
//!
//! Runs on a blocking thread: pulls points from the source, appends each to
//! the batch of its partition and sends a batch to the workers as soon as it
//! holds `batch_size` points. When the source is exhausted (or the run is
//! stopped) the remaining non-empty batches are flushed in partition order and
//! the queues are closed.

use crate::queue::WorkQueues;
use std::sync::Arc;
use tracing::{debug, info};
use tsbench_interfaces::{Batch, BatchFactory, DataSource, LoadError, LoadResult, PointIndexer};
use tsbench_resilience::ShutdownCoordinator;

/// What the scheduler did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub points_read: u64,
    pub batches_sent: u64,
    /// Stopped early because of a shutdown request
    pub cancelled: bool,
    /// Stopped early because the point limit was reached
    pub limit_reached: bool,
    /// Stopped early because every worker had exited
    pub queue_closed: bool,
}

pub struct Scheduler<S: DataSource, F: BatchFactory> {
    source: S,
    indexer: Box<dyn PointIndexer<S::Point>>,
    factory: Arc<F>,
    batch_size: usize,
    partitions: usize,
    limit: Option<u64>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl<S, F> Scheduler<S, F>
where
    S: DataSource,
    F: BatchFactory,
    F::Batch: Batch<Point = S::Point>,
{
    pub fn new(
        source: S,
        indexer: Box<dyn PointIndexer<S::Point>>,
        factory: Arc<F>,
        batch_size: usize,
        partitions: usize,
    ) -> Self {
        Self {
            source,
            indexer,
            factory,
            batch_size: batch_size.max(1),
            partitions: partitions.max(1),
            limit: None,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Stop after reading `limit` points
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Scan the source until it is exhausted, the limit is reached or a stop
    /// is requested. Consumes the queues so they close on every exit path.
    pub fn run(mut self, queues: WorkQueues<F::Batch>) -> LoadResult<ScanStats> {
        let mut stats = ScanStats::default();
        let mut batches: Vec<F::Batch> = (0..self.partitions).map(|_| self.factory.new_batch()).collect();

        debug!(
            "Scheduler started: {} partitions, batch size {}",
            self.partitions, self.batch_size
        );

        loop {
            if self.shutdown.is_shutting_down() {
                info!("Stop requested after {} points, flushing partial batches", stats.points_read);
                stats.cancelled = true;
                break;
            }
            if self.limit.is_some_and(|limit| stats.points_read >= limit) {
                stats.limit_reached = true;
                break;
            }

            let Some(point) = self.source.next_item()? else {
                break;
            };
            stats.points_read += 1;

            let index = self.indexer.get_index(&point);
            if index >= self.partitions {
                return Err(LoadError::Internal(format!(
                    "indexer returned partition {} of {}",
                    index, self.partitions
                )));
            }

            let batch = &mut batches[index];
            batch.append(point)?;

            if batch.len() >= self.batch_size {
                let full = std::mem::replace(batch, self.factory.new_batch());
                if !queues.send_blocking(index, full) {
                    stats.queue_closed = true;
                    return Ok(stats);
                }
                stats.batches_sent += 1;
            }
        }

        for (index, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                self.factory.recycle(batch);
                continue;
            }
            if !queues.send_blocking(index, batch) {
                stats.queue_closed = true;
                return Ok(stats);
            }
            stats.batches_sent += 1;
        }

        debug!(
            "Scheduler finished: {} points in {} batches",
            stats.points_read, stats.batches_sent
        );
        Ok(stats)
    }
}
