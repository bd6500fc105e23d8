//! tsbench load engine
//!
//! Reads points from a [`DataSource`](tsbench_interfaces::DataSource), routes
//! them to partitions, accumulates per-partition batches and hands full
//! batches to a fixed pool of workers over bounded queues. Workers ship
//! batches through their [`Processor`](tsbench_interfaces::Processor), which
//! resends batches the backend pushes back on. Throughput is counted with
//! atomic counters, reported periodically and summarised at the end.

pub mod counters;
pub mod indexer;
pub mod pool;
pub mod processor;
pub mod queue;
pub mod reporter;
pub mod runner;
pub mod scheduler;
pub mod summary;
pub mod worker;

// Re-export main types
pub use counters::{CounterSnapshot, RunCounters};
pub use indexer::{fnv1_32, indexer_for, ConstantIndexer, HashIndexer};
pub use pool::{Pool, PoolStats, PooledBatchFactory};
pub use processor::{BackoffProcessor, ProcessorOptions, ProcessorStats};
pub use queue::{work_queues, WorkQueues, WorkReceiver};
pub use reporter::{ProgressLine, ProgressReporter, ProgressTracker, PROGRESS_HEADER};
pub use runner::{BenchmarkRunner, RunHandle};
pub use scheduler::{ScanStats, Scheduler};
pub use summary::RunSummary;
pub use worker::{Worker, WorkerReport};
