//! Generic backoff-aware processor
//!
//! Wraps a single-attempt [`BatchWriter`] with the fixed-sleep resend loop,
//! the optional rate limiter and the per-worker backoff observer, so backends
//! only have to describe how one batch goes over the wire.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tsbench_interfaces::{
    BackoffSummary, BatchCounts, BatchWriter, LoadError, LoadResult, Processor, WorkerContext,
};
use tsbench_interfaces::Batch as _;
use tsbench_resilience::{BackoffTracker, RateLimiter, RetryExecutor, RetryPolicy};

/// How a [`BackoffProcessor`] resends batches
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Sleep between resends of a pushed-back batch
    pub backoff: Duration,
    /// Shared across workers when set; charged one permit per metric
    pub limiter: Option<Arc<RateLimiter>>,
    /// Give up on a batch after this many attempts; `None` resends forever
    pub max_attempts: Option<u32>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            limiter: None,
            max_attempts: None,
        }
    }
}

impl ProcessorOptions {
    pub fn new(backoff: Duration) -> Self {
        Self {
            backoff,
            ..Default::default()
        }
    }

    pub fn with_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::fixed(self.backoff);
        match self.max_attempts {
            Some(max) => policy.with_max_attempts(max),
            None => policy,
        }
    }
}

/// Send statistics for one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Write attempts, resends included
    pub sends: u64,
    /// Times a batch was pushed back and resent
    pub backoffs: u64,
}

pub struct BackoffProcessor<W: BatchWriter> {
    writer: W,
    options: ProcessorOptions,
    executor: RetryExecutor,
    tracker: Option<BackoffTracker>,
    worker: usize,
    connected: bool,
    stats: ProcessorStats,
}

impl<W: BatchWriter> BackoffProcessor<W> {
    pub fn new(writer: W, options: ProcessorOptions) -> Self {
        let executor = RetryExecutor::new(options.policy()).with_limiter(options.limiter.clone());
        Self {
            writer,
            options,
            executor,
            tracker: None,
            worker: 0,
            connected: false,
            stats: ProcessorStats::default(),
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }
}

#[async_trait]
impl<W: BatchWriter> Processor for BackoffProcessor<W> {
    type Batch = W::Batch;

    async fn init(&mut self, ctx: &WorkerContext) -> LoadResult<()> {
        self.worker = ctx.worker;

        let tracker = BackoffTracker::spawn(ctx.worker, ctx.backoff_gauge.clone());
        self.executor = RetryExecutor::new(self.options.policy())
            .with_limiter(self.options.limiter.clone())
            .with_shutdown(Arc::clone(&ctx.shutdown));
        self.executor.attach_observer(tracker.sender());
        self.tracker = Some(tracker);

        if ctx.do_load {
            self.writer.connect(ctx).await?;
            self.connected = true;
        }
        Ok(())
    }

    async fn process_batch(&mut self, batch: &mut Self::Batch, do_load: bool) -> LoadResult<BatchCounts> {
        let counts = batch.counts();
        if !do_load {
            return Ok(counts);
        }

        let writer = &self.writer;
        let batch: &W::Batch = batch;
        let result = self
            .executor
            .execute(counts.metrics, || writer.write(batch))
            .await;

        match result {
            Ok(outcome) => {
                self.stats.sends += u64::from(outcome.attempts);
                self.stats.backoffs += u64::from(outcome.backoffs());
                Ok(counts)
            }
            Err(e) => Err(LoadError::from(e)),
        }
    }

    async fn close(&mut self, _do_load: bool) -> LoadResult<BackoffSummary> {
        self.executor.detach_observer();

        let summary = match self.tracker.take() {
            Some(tracker) => tracker.finish().await,
            None => BackoffSummary {
                worker: self.worker,
                ..Default::default()
            },
        };

        if self.connected {
            self.connected = false;
            self.writer.disconnect().await?;
        }

        debug!(
            "[worker {}] {} sends, {} backoffs",
            self.worker, self.stats.sends, self.stats.backoffs
        );
        if summary.episodes > 0 {
            info!(
                "[worker {}] backed off {} times for {:.2}sec in total",
                summary.worker,
                summary.episodes,
                summary.total.as_secs_f64()
            );
        }
        Ok(summary)
    }
}
