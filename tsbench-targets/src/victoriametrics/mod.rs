//! VictoriaMetrics, accepting InfluxDB line protocol on `/write`

use crate::common::http::{build_client, post_body, status_error};
use crate::common::setup::{processor_options, select_source, shared_limiter, worker_endpoint, BoxedSource};
use crate::common::{generate, simulator_for, LineBatch, LineFileSource, LinePoint, LineProtocolSerializer};
use crate::error::TargetResult;
use crate::registry::Target;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;
use tsbench_config::{DataSourceConfig, SimulatorConfig, TargetConfig, TsbenchConfig};
use tsbench_interfaces::{Benchmark, BatchWriter, LoadError, LoadResult, PointIndexer, WorkerContext};
use tsbench_load::{indexer_for, BackoffProcessor, BenchmarkRunner, PooledBatchFactory, RunSummary};
use tsbench_resilience::RateLimiter;
use url::Url;

pub const DEFAULT_WRITE_PATH: &str = "/write";

const BATCH_BUFFER_BYTES: usize = 64 * 1024;

/// Statuses VictoriaMetrics uses to shed load
pub fn is_backpressure(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

pub struct VmWriter {
    client: reqwest::Client,
    target: TargetConfig,
    url: Option<Url>,
}

impl VmWriter {
    pub fn new(client: reqwest::Client, target: TargetConfig) -> Self {
        Self {
            client,
            target,
            url: None,
        }
    }
}

#[async_trait]
impl BatchWriter for VmWriter {
    type Batch = LineBatch;

    async fn connect(&mut self, ctx: &WorkerContext) -> LoadResult<()> {
        let url = worker_endpoint(&self.target, ctx.worker, DEFAULT_WRITE_PATH)?;
        debug!("[worker {}] writing to {}", ctx.worker, url);
        self.url = Some(url);
        Ok(())
    }

    async fn write(&self, batch: &LineBatch) -> LoadResult<()> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| LoadError::Internal("victoriametrics writer used before connect".to_string()))?;

        let (status, text) = post_body(&self.client, url, batch.as_bytes(), "text/plain", self.target.gzip).await?;
        match status {
            StatusCode::NO_CONTENT => Ok(()),
            status if is_backpressure(status) => Err(LoadError::Backpressure),
            status => Err(status_error(url, status, &text)),
        }
    }
}

pub struct VmBenchmark {
    data_source: DataSourceConfig,
    target: TargetConfig,
    client: reqwest::Client,
    limiter: Option<Arc<RateLimiter>>,
}

impl VmBenchmark {
    pub fn new(config: &TsbenchConfig) -> LoadResult<Self> {
        Ok(Self {
            data_source: config.data_source.clone(),
            target: config.target.clone(),
            client: build_client(config.target.timeout)?,
            limiter: shared_limiter(&config.target),
        })
    }
}

impl Benchmark for VmBenchmark {
    type Point = LinePoint;
    type Batch = LineBatch;
    type Source = BoxedSource<LinePoint>;
    type Factory = PooledBatchFactory<LineBatch>;
    type Processor = BackoffProcessor<VmWriter>;

    fn data_source(&mut self) -> LoadResult<Self::Source> {
        select_source(&self.data_source, LineProtocolSerializer, |reader| -> BoxedSource<LinePoint> {
            Box::new(LineFileSource::new(reader))
        })
    }

    fn batch_factory(&self) -> Self::Factory {
        PooledBatchFactory::new(|| LineBatch::with_capacity(BATCH_BUFFER_BYTES))
    }

    fn point_indexer(&self, partitions: usize) -> Box<dyn PointIndexer<LinePoint>> {
        indexer_for(partitions)
    }

    fn processor(&self) -> LoadResult<Self::Processor> {
        Ok(BackoffProcessor::new(
            VmWriter::new(self.client.clone(), self.target.clone()),
            processor_options(&self.target, self.limiter.clone()),
        ))
    }
}

pub struct VictoriaMetricsTarget;

#[async_trait]
impl Target for VictoriaMetricsTarget {
    fn name(&self) -> &'static str {
        "victoriametrics"
    }

    fn description(&self) -> &'static str {
        "VictoriaMetrics, line protocol over HTTP"
    }

    async fn load(&self, config: &TsbenchConfig, runner: BenchmarkRunner) -> TargetResult<RunSummary> {
        let bench = VmBenchmark::new(config)?;
        Ok(runner.run(bench).await?)
    }

    fn generate(&self, config: &SimulatorConfig, out: &mut dyn Write) -> TargetResult<u64> {
        Ok(generate(simulator_for(config)?, &LineProtocolSerializer, out)?)
    }
}
