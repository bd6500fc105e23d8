//! # tsbench Interfaces
//!
//! The plug-in contract between the load engine and the backends it drives.
//!
//! A backend provides a [`Benchmark`]: a [`DataSource`] producing points, a
//! [`PointIndexer`] routing them to partitions, a [`BatchFactory`] handing out
//! [`Batch`]es, a [`Processor`] per worker that ships batches, and optionally a
//! [`DbCreator`] that prepares the database before a run.
//!
//! Backends signal "not now, retry later" by returning
//! [`LoadError::Backpressure`]; every other error ends the run.

pub mod batch;
pub mod benchmark;
pub mod error;
pub mod header;
pub mod processor;
pub mod source;

pub use batch::{Batch, BatchCounts, BatchFactory};
pub use benchmark::{Benchmark, DbCreator};
pub use error::{LoadError, LoadResult};
pub use header::SchemaHeader;
pub use processor::{BatchWriter, Processor, WorkerContext};
pub use tsbench_resilience::BackoffSummary;
pub use source::{DataSource, PartitionKey, PointIndexer};
