//! The bundle a backend registers with the load engine

use crate::batch::{Batch, BatchFactory};
use crate::error::LoadResult;
use crate::processor::Processor;
use crate::source::{DataSource, PointIndexer};
use async_trait::async_trait;

/// Everything the engine needs to load one backend
pub trait Benchmark: Send {
    type Point: Send + 'static;
    type Batch: Batch<Point = Self::Point>;
    type Source: DataSource<Point = Self::Point> + 'static;
    type Factory: BatchFactory<Batch = Self::Batch>;
    type Processor: Processor<Batch = Self::Batch>;

    /// The point source; called once per run
    fn data_source(&mut self) -> LoadResult<Self::Source>;

    /// Batch factory shared by the scheduler and every worker
    fn batch_factory(&self) -> Self::Factory;

    /// Indexer routing points into `partitions` buckets
    fn point_indexer(&self, partitions: usize) -> Box<dyn PointIndexer<Self::Point>>;

    /// A fresh processor for one worker
    fn processor(&self) -> LoadResult<Self::Processor>;

    /// Database preparation, for backends that need it
    fn db_creator(&self) -> Option<Box<dyn DbCreator>> {
        None
    }
}

/// Prepares the target database before a run
#[async_trait]
pub trait DbCreator: Send + Sync {
    async fn init(&mut self) -> LoadResult<()> {
        Ok(())
    }

    async fn db_exists(&self, db_name: &str) -> LoadResult<bool>;

    async fn remove_old_db(&self, db_name: &str) -> LoadResult<()>;

    async fn create_db(&self, db_name: &str) -> LoadResult<()>;

    async fn close(&mut self) {}
}
