//! Per-worker batch processing

use crate::batch::{Batch, BatchCounts};
use crate::error::LoadResult;
use crate::header::SchemaHeader;
use async_trait::async_trait;
use std::sync::Arc;
use tsbench_resilience::{BackoffGauge, BackoffSummary, ShutdownCoordinator};

/// What a processor learns about the worker it runs in
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Zero-based worker index
    pub worker: usize,
    /// Whether batches are actually sent
    pub do_load: bool,
    /// Whether this worker owns a dedicated queue
    pub hash_workers: bool,
    /// Database being loaded
    pub db_name: String,
    /// Schema of the data being loaded
    pub headers: Arc<SchemaHeader>,
    /// Run-wide stop requests
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Run-wide live backoff time, if anyone is watching it
    pub backoff_gauge: Option<Arc<BackoffGauge>>,
}

impl WorkerContext {
    pub fn new(worker: usize, do_load: bool, hash_workers: bool) -> Self {
        Self {
            worker,
            do_load,
            hash_workers,
            db_name: String::new(),
            headers: Arc::new(SchemaHeader::default()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            backoff_gauge: None,
        }
    }

    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    pub fn with_headers(mut self, headers: Arc<SchemaHeader>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_backoff_gauge(mut self, gauge: Arc<BackoffGauge>) -> Self {
        self.backoff_gauge = Some(gauge);
        self
    }
}

/// Ships batches for one worker
///
/// A processor is owned by exactly one worker task. `init` runs once before
/// the first batch, `close` once after the last.
#[async_trait]
pub trait Processor: Send + 'static {
    type Batch: Batch;

    /// Acquire per-worker backend resources
    async fn init(&mut self, ctx: &WorkerContext) -> LoadResult<()>;

    /// Deliver a batch, resending it while the backend pushes back
    ///
    /// With `do_load == false` no I/O happens and the batch counts are
    /// returned directly.
    async fn process_batch(&mut self, batch: &mut Self::Batch, do_load: bool) -> LoadResult<BatchCounts>;

    /// Release resources and report accumulated backoff time
    async fn close(&mut self, do_load: bool) -> LoadResult<BackoffSummary>;
}

/// A single attempt at delivering a batch to a backend
///
/// Writers do no retrying of their own: returning
/// [`LoadError::Backpressure`](crate::LoadError::Backpressure) makes the
/// caller sleep and resend the whole batch.
#[async_trait]
pub trait BatchWriter: Send + Sync + 'static {
    type Batch: Batch;

    /// Open per-worker connections
    async fn connect(&mut self, _ctx: &WorkerContext) -> LoadResult<()> {
        Ok(())
    }

    /// Send the batch once
    async fn write(&self, batch: &Self::Batch) -> LoadResult<()>;

    /// Close per-worker connections
    async fn disconnect(&mut self) -> LoadResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_context_builder() {
        let headers = Arc::new(SchemaHeader::new().with_measurement("cpu", ["usage_user"]));
        let ctx = WorkerContext::new(2, true, false)
            .with_db_name("benchmark")
            .with_headers(headers.clone());

        assert_eq!(ctx.worker, 2);
        assert!(ctx.do_load);
        assert_eq!(ctx.db_name, "benchmark");
        assert!(Arc::ptr_eq(&ctx.headers, &headers));
    }

    #[test]
    fn test_default_context_is_not_shutting_down() {
        let ctx = WorkerContext::new(0, false, true);
        assert!(!ctx.shutdown.is_shutting_down());
        assert!(ctx.backoff_gauge.is_none());
        assert!(ctx.hash_workers);
    }
}
