//! InfluxDB 1.x over the HTTP line protocol API

mod creator;
mod writer;

pub use creator::{InfluxCreator, DEFAULT_SETTLE};
pub use writer::{is_backpressure, InfluxWriter, DEFAULT_WRITE_PATH};

use crate::common::http::build_client;
use crate::common::setup::{processor_options, select_source, shared_limiter, BoxedSource};
use crate::common::{generate, simulator_for, LineBatch, LineFileSource, LinePoint, LineProtocolSerializer};
use crate::error::TargetResult;
use crate::registry::Target;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tsbench_config::{DataSourceConfig, SimulatorConfig, TargetConfig, TsbenchConfig};
use tsbench_interfaces::{Benchmark, DbCreator, LoadResult, PointIndexer};
use tsbench_load::{indexer_for, BackoffProcessor, BenchmarkRunner, PooledBatchFactory, RunSummary};
use tsbench_resilience::RateLimiter;

/// Initial capacity of a batch body
const BATCH_BUFFER_BYTES: usize = 64 * 1024;

pub struct InfluxBenchmark {
    data_source: DataSourceConfig,
    target: TargetConfig,
    client: reqwest::Client,
    limiter: Option<Arc<RateLimiter>>,
}

impl InfluxBenchmark {
    pub fn new(config: &TsbenchConfig) -> LoadResult<Self> {
        Ok(Self {
            data_source: config.data_source.clone(),
            target: config.target.clone(),
            client: build_client(config.target.timeout)?,
            limiter: shared_limiter(&config.target),
        })
    }
}

impl Benchmark for InfluxBenchmark {
    type Point = LinePoint;
    type Batch = LineBatch;
    type Source = BoxedSource<LinePoint>;
    type Factory = PooledBatchFactory<LineBatch>;
    type Processor = BackoffProcessor<InfluxWriter>;

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
            InfluxWriter::new(self.client.clone(), self.target.clone()),
            processor_options(&self.target, self.limiter.clone()),
        ))
    }

    fn db_creator(&self) -> Option<Box<dyn DbCreator>> {
        let base_url = self.target.url_for_worker(0)?;
        Some(Box::new(InfluxCreator::new(
            self.client.clone(),
            base_url,
            self.target.replication_factor,
        )))
    }
}

pub struct InfluxTarget;

#[async_trait]
impl Target for InfluxTarget {
    fn name(&self) -> &'static str {
        "influx"
    }

    fn description(&self) -> &'static str {
        "InfluxDB 1.x, line protocol over HTTP with database creation"
    }

    async fn load(&self, config: &TsbenchConfig, runner: BenchmarkRunner) -> TargetResult<RunSummary> {
        let bench = InfluxBenchmark::new(config)?;
        Ok(runner.run(bench).await?)
    }

    fn generate(&self, config: &SimulatorConfig, out: &mut dyn Write) -> TargetResult<u64> {
        let simulator = simulator_for(config)?;
        Ok(generate(simulator, &LineProtocolSerializer, out)?)
    }
}
