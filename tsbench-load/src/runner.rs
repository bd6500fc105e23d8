//! Run controller
//!
//! Prepares the database, starts the workers and the reporter, runs the
//! scheduler on a blocking thread and folds everything into a
//! [`RunSummary`] once the workers have drained.

use crate::counters::{CounterSnapshot, RunCounters};
use crate::queue::work_queues;
use crate::reporter::ProgressReporter;
use crate::scheduler::{ScanStats, Scheduler};
use crate::summary::RunSummary;
use crate::worker::{Worker, WorkerReport};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};
use tsbench_config::RunnerConfig;
use tsbench_interfaces::{Benchmark, DataSource, DbCreator, LoadError, LoadResult, WorkerContext};
use tsbench_resilience::{ShutdownCoordinator, ShutdownSignal};

/// Control handle for a run in progress
#[derive(Debug, Clone)]
pub struct RunHandle {
    shutdown: Arc<ShutdownCoordinator>,
    counters: Arc<RunCounters>,
}

impl RunHandle {
    /// Stop reading points; queued batches are still delivered
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Abandon queued and in-flight batches
    pub fn force_stop(&self) {
        let _ = self.shutdown.request(ShutdownSignal::Forced);
    }

    pub fn progress(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

pub struct BenchmarkRunner {
    config: RunnerConfig,
    shutdown: Arc<ShutdownCoordinator>,
    counters: Arc<RunCounters>,
}

impl BenchmarkRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            counters: Arc::new(RunCounters::new()),
        }
    }

    /// Share a coordinator, e.g. one wired to interrupt signals
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            shutdown: Arc::clone(&self.shutdown),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Load everything `bench` produces and report what was loaded
    pub async fn run<B: Benchmark>(self, mut bench: B) -> LoadResult<RunSummary> {
        let config = &self.config;
        if config.do_load && config.do_create_db {
            if let Some(creator) = bench.db_creator() {
                self.prepare_database(creator).await?;
            }
        }

        let mut source = bench.data_source()?;
        let headers = source.headers()?;

        let workers = config.workers.max(1);
        let partitions = config.effective_partitions();
        let factory = Arc::new(bench.batch_factory());
        let indexer = bench.point_indexer(partitions);
        let (queues, receivers) = work_queues(workers, config.effective_channel_capacity(), config.hash_workers);

        info!(
            "Loading with {} workers, {} partitions, batch size {}{}",
            workers,
            partitions,
            config.batch_size,
            if config.do_load { "" } else { " (dry run)" }
        );

        let start = Instant::now();
        let mut tasks = JoinSet::new();
        for (index, receiver) in receivers.into_iter().enumerate() {
            let ctx = WorkerContext::new(index, config.do_load, config.hash_workers)
                .with_db_name(config.db_name.clone())
                .with_headers(Arc::clone(&headers))
                .with_shutdown(Arc::clone(&self.shutdown))
                .with_backoff_gauge(self.counters.backoff_gauge());
            let worker = Worker::new(
                ctx,
                bench.processor()?,
                receiver,
                Arc::clone(&factory),
                Arc::clone(&self.counters),
            );
            tasks.spawn(worker.run());
        }

        let reporter = ProgressReporter::spawn(Arc::clone(&self.counters), config.reporting_period);
        let mut timers = vec![self.shutdown.escalate_after(config.shutdown_grace)];
        if let Some(max_run_time) = config.max_run_time {
            timers.push(self.shutdown.stop_after(max_run_time));
        }

        let scheduler = Scheduler::new(source, indexer, factory, config.batch_size, partitions)
            .with_limit(config.point_limit())
            .with_shutdown(Arc::clone(&self.shutdown));
        let mut scan = tokio::task::spawn_blocking(move || scheduler.run(queues));

        let mut scanned: Option<LoadResult<ScanStats>> = None;
        let mut reports: Vec<WorkerReport> = Vec::with_capacity(workers);
        let mut failure: Option<LoadError> = None;

        while !tasks.is_empty() {
            tokio::select! {
                result = &mut scan, if scanned.is_none() => {
                    let result = flatten(result);
                    if let Err(e) = &result {
                        error!("Reading points failed: {}", e);
                        let _ = self.shutdown.request(ShutdownSignal::Forced);
                    }
                    scanned = Some(result);
                }
                Some(joined) = tasks.join_next() => match flatten(joined) {
                    Ok(report) => reports.push(report),
                    Err(e) => {
                        error!("{}", e);
                        let _ = self.shutdown.request(ShutdownSignal::Forced);
                        failure.get_or_insert(e);
                    }
                },
            }
        }
        let scanned = match scanned {
            Some(result) => result,
            None => flatten(scan.await),
        };
        let elapsed = start.elapsed();

        if let Some(reporter) = reporter {
            reporter.stop().await;
        }
        for timer in timers {
            timer.abort();
        }

        let scan = scanned?;
        if let Some(e) = failure {
            return Err(e);
        }

        let totals = self.counters.snapshot();
        let cancelled = scan.cancelled || reports.iter().any(|r| r.cancelled);
        let backoffs = reports.into_iter().map(|r| r.backoff).collect();
        debug!("Scheduler: {:?}", scan);

        Ok(RunSummary::new(workers, totals.rows, totals.metrics, totals.batches, elapsed)
            .with_points_read(scan.points_read)
            .with_backoffs(backoffs)
            .with_cancelled(cancelled))
    }

    async fn prepare_database(&self, mut creator: Box<dyn DbCreator>) -> LoadResult<()> {
        let db_name = &self.config.db_name;

        creator.init().await?;
        let result = async {
            if creator.db_exists(db_name).await? {
                if self.config.do_abort_on_exist {
                    return Err(LoadError::setup(format!(
                        "database '{}' exists and abort on exist is set",
                        db_name
                    )));
                }
                info!("Removing existing database '{}'", db_name);
                creator.remove_old_db(db_name).await?;
            }
            creator.create_db(db_name).await
        }
        .await;
        creator.close().await;
        result
    }
}

fn flatten<T>(joined: Result<LoadResult<T>, tokio::task::JoinError>) -> LoadResult<T> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(LoadError::Internal(format!("task panicked: {}", e))),
        Err(e) => Err(LoadError::Internal(format!("task failed: {}", e))),
    }
}
