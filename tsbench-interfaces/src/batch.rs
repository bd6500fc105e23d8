//! Batches of points handed to a backend in a single call

use crate::error::LoadResult;

/// Points of one partition accumulated for a single backend call
pub trait Batch: Send + Sync + 'static {
    type Point: Send + 'static;

    /// Number of point records (row count)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scalar field values, never less than `len` for
    /// ordinary measurements
    fn metric_count(&self) -> u64;

    /// Add a point; malformed points are rejected with a parse error
    fn append(&mut self, point: Self::Point) -> LoadResult<()>;

    /// Clear the contents while keeping allocated storage
    fn reset(&mut self);

    fn counts(&self) -> BatchCounts {
        BatchCounts {
            metrics: self.metric_count(),
            rows: self.len() as u64,
        }
    }
}

/// Hands out empty batches and takes them back once processed
pub trait BatchFactory: Send + Sync + 'static {
    type Batch: Batch;

    /// An empty batch, recycled when one is available
    fn new_batch(&self) -> Self::Batch;

    /// Return a processed batch for reuse
    fn recycle(&self, batch: Self::Batch) {
        drop(batch);
    }
}

/// Metrics and rows accounted for one processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub metrics: u64,
    pub rows: u64,
}

impl std::ops::AddAssign for BatchCounts {
    fn add_assign(&mut self, other: Self) {
        self.metrics += other.metrics;
        self.rows += other.rows;
    }
}
