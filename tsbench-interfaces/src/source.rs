//! Point sources and partition routing

use crate::error::LoadResult;
use crate::header::SchemaHeader;
use std::sync::Arc;

/// Produces points in wire-ready form
///
/// Used from a single thread (the scheduler). `headers` may be called before
/// the first `next_item` or interleaved with iteration and always returns the
/// same header. `Ok(None)` from `next_item` marks the end of the stream and is
/// terminal.
pub trait DataSource: Send {
    type Point: Send + 'static;

    /// Schema of the data this source produces
    fn headers(&mut self) -> LoadResult<Arc<SchemaHeader>>;

    /// Next point, or `None` once the source is exhausted
    fn next_item(&mut self) -> LoadResult<Option<Self::Point>>;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    type Point = S::Point;

    fn headers(&mut self) -> LoadResult<Arc<SchemaHeader>> {
        (**self).headers()
    }

    fn next_item(&mut self) -> LoadResult<Option<Self::Point>> {
        (**self).next_item()
    }
}

/// Routes a point to a partition in `[0, partitions)`
///
/// Must be pure: the same point always maps to the same partition.
pub trait PointIndexer<P>: Send {
    fn get_index(&self, point: &P) -> usize;
}

/// Bytes a point is partitioned on
pub trait PartitionKey {
    fn partition_key(&self) -> &[u8];
}
