//! Worker task: drains a queue through one processor

use crate::counters::RunCounters;
use crate::queue::WorkReceiver;
use std::sync::Arc;
use tracing::{debug, warn};
use tsbench_interfaces::{
    BackoffSummary, Batch, BatchCounts, BatchFactory, LoadResult, Processor, WorkerContext,
};
use tsbench_resilience::ShutdownSignal;

/// What one worker did over the run
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub worker: usize,
    pub counts: BatchCounts,
    pub batches: u64,
    pub backoff: BackoffSummary,
    /// Stopped by a forced shutdown with batches possibly left undelivered
    pub cancelled: bool,
}

pub struct Worker<P, F>
where
    P: Processor,
    F: BatchFactory<Batch = P::Batch>,
{
    ctx: WorkerContext,
    processor: P,
    receiver: WorkReceiver<P::Batch>,
    factory: Arc<F>,
    counters: Arc<RunCounters>,
}

impl<P, F> Worker<P, F>
where
    P: Processor,
    F: BatchFactory<Batch = P::Batch>,
{
    pub fn new(
        ctx: WorkerContext,
        processor: P,
        receiver: WorkReceiver<P::Batch>,
        factory: Arc<F>,
        counters: Arc<RunCounters>,
    ) -> Self {
        Self {
            ctx,
            processor,
            receiver,
            factory,
            counters,
        }
    }

    /// Process batches until the queue is closed and drained, or a forced
    /// shutdown is requested. The processor is always closed, also on error.
    pub async fn run(mut self) -> LoadResult<WorkerReport> {
        let worker = self.ctx.worker;
        self.processor
            .init(&self.ctx)
            .await
            .map_err(|e| e.in_worker(worker))?;

        self.counters.worker_started();
        let mut report = WorkerReport {
            worker,
            ..Default::default()
        };
        let drained = self.drain(&mut report).await;
        self.counters.worker_finished();

        // Stop taking batches before the processor goes away
        self.receiver.close().await;

        let closed = self.processor.close(self.ctx.do_load).await;
        match (drained, closed) {
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("[worker {}] close failed after error: {}", worker, close_err);
                }
                Err(e.in_worker(worker))
            }
            (Ok(()), Err(e)) => Err(e.in_worker(worker)),
            (Ok(()), Ok(backoff)) => {
                report.backoff = backoff;
                debug!(
                    "[worker {}] done: {} batches, {} rows, {} metrics",
                    worker, report.batches, report.counts.rows, report.counts.metrics
                );
                Ok(report)
            }
        }
    }

    async fn drain(&mut self, report: &mut WorkerReport) -> LoadResult<()> {
        let shutdown = Arc::clone(&self.ctx.shutdown);

        loop {
            if shutdown.is_forced() {
                report.cancelled = true;
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                _ = shutdown.wait_for(ShutdownSignal::Forced) => {
                    report.cancelled = true;
                    return Ok(());
                }
                batch = self.receiver.recv() => batch,
            };
            let Some(mut batch) = next else {
                return Ok(());
            };

            match self.processor.process_batch(&mut batch, self.ctx.do_load).await {
                Ok(counts) => {
                    self.counters.add(counts);
                    report.counts += counts;
                    report.batches += 1;
                    self.factory.recycle(batch);
                }
                Err(e) if e.is_cancelled() => {
                    warn!(
                        "[worker {}] abandoning batch of {} rows on forced shutdown",
                        self.ctx.worker,
                        batch.len()
                    );
                    report.cancelled = true;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
}
