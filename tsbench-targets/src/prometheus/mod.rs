//! Prometheus text exposition pushed to an import endpoint
//!
//! Points come as hypertable rows; each value becomes one sample named
//! `<measurement>_<field>` with the row's tags as labels.

use crate::common::http::{build_client, post_body, status_error};
use crate::common::hypertable::HyperRow;
use crate::common::setup::{processor_options, select_source, shared_limiter, worker_endpoint, BoxedSource};
use crate::common::{generate, simulator_for, HyperBatch, HyperFileSource, HyperPoint, HypertableSerializer};
use crate::error::TargetResult;
use crate::registry::Target;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt::Write as _;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;
use tsbench_config::{DataSourceConfig, SimulatorConfig, TargetConfig, TsbenchConfig};
use tsbench_interfaces::{
    Batch, Benchmark, BatchWriter, LoadError, LoadResult, PointIndexer, SchemaHeader, WorkerContext,
};
use tsbench_load::{indexer_for, BackoffProcessor, BenchmarkRunner, PooledBatchFactory, RunSummary};
use tsbench_resilience::RateLimiter;
use url::Url;

pub const DEFAULT_WRITE_PATH: &str = "/api/v1/import/prometheus";

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Metric names may only hold `[a-zA-Z0-9_:]` and must not start with a digit
fn push_metric_name(out: &mut String, name: &str) {
    for (i, c) in name.chars().enumerate() {
        let valid = c.is_ascii_alphabetic() || c == '_' || c == ':' || (i > 0 && c.is_ascii_digit());
        out.push(if valid { c } else { '_' });
    }
}

fn push_label_value(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

fn labels(row: &HyperRow) -> String {
    let mut out = String::with_capacity(row.tags.len() + 16);
    for (i, (key, value)) in row.tag_pairs().enumerate() {
        out.push(if i == 0 { '{' } else { ',' });
        push_metric_name(&mut out, key);
        out.push_str("=\"");
        push_label_value(&mut out, value);
        out.push('"');
    }
    if !out.is_empty() {
        out.push('}');
    }
    out
}

/// Render a batch as text exposition, one sample per field value with a
/// millisecond timestamp. Returns the body and the number of samples.
pub fn render(batch: &HyperBatch, headers: &SchemaHeader) -> LoadResult<(String, u64)> {
    let mut out = String::with_capacity(batch.len() * 256);
    let mut samples = 0;

    for (measurement, rows) in batch.tables() {
        let fields = headers
            .fields(measurement)
            .ok_or_else(|| LoadError::parse(format!("no field keys for measurement '{}'", measurement)))?;

        for row in rows {
            let labels = labels(row);
            let (timestamp, values) = row.timestamp_and_values()?;
            let millis = timestamp / 1_000_000;
            if row.value_count() != fields.len() {
                return Err(LoadError::parse(format!(
                    "'{}' row has {} values, header lists {} fields",
                    measurement,
                    row.value_count(),
                    fields.len()
                )));
            }

            for (field, value) in fields.iter().zip(values) {
                push_metric_name(&mut out, measurement);
                out.push('_');
                push_metric_name(&mut out, field);
                let _ = writeln!(out, "{} {} {}", labels, value, millis);
                samples += 1;
            }
        }
    }
    Ok((out, samples))
}

pub struct PromWriter {
    client: reqwest::Client,
    target: TargetConfig,
    url: Option<Url>,
    headers: Arc<SchemaHeader>,
}

impl PromWriter {
    pub fn new(client: reqwest::Client, target: TargetConfig) -> Self {
        Self {
            client,
            target,
            url: None,
            headers: Arc::new(SchemaHeader::default()),
        }
    }
}

#[async_trait]
impl BatchWriter for PromWriter {
    type Batch = HyperBatch;

    async fn connect(&mut self, ctx: &WorkerContext) -> LoadResult<()> {
        let url = worker_endpoint(&self.target, ctx.worker, DEFAULT_WRITE_PATH)?;
        debug!("[worker {}] importing into {}", ctx.worker, url);
        self.url = Some(url);
        self.headers = Arc::clone(&ctx.headers);
        Ok(())
    }

    async fn write(&self, batch: &HyperBatch) -> LoadResult<()> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| LoadError::Internal("prometheus writer used before connect".to_string()))?;

        let (body, _) = render(batch, &self.headers)?;
        let (status, text) = post_body(&self.client, url, body.as_bytes(), CONTENT_TYPE, self.target.gzip).await?;
        match status {
            status if status.is_success() => Ok(()),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => Err(LoadError::Backpressure),
            status => Err(status_error(url, status, &text)),
        }
    }
}

pub struct PromBenchmark {
    data_source: DataSourceConfig,
    target: TargetConfig,
    client: reqwest::Client,
    limiter: Option<Arc<RateLimiter>>,
}

impl PromBenchmark {
    pub fn new(config: &TsbenchConfig) -> LoadResult<Self> {
        Ok(Self {
            data_source: config.data_source.clone(),
            target: config.target.clone(),
            client: build_client(config.target.timeout)?,
            limiter: shared_limiter(&config.target),
        })
    }
}

impl Benchmark for PromBenchmark {
    type Point = HyperPoint;
    type Batch = HyperBatch;
    type Source = BoxedSource<HyperPoint>;
    type Factory = PooledBatchFactory<HyperBatch>;
    type Processor = BackoffProcessor<PromWriter>;

    fn data_source(&mut self) -> LoadResult<Self::Source> {
        select_source(&self.data_source, HypertableSerializer, |reader| -> BoxedSource<HyperPoint> {
            Box::new(HyperFileSource::new(reader))
        })
    }

    fn batch_factory(&self) -> Self::Factory {
        PooledBatchFactory::new(HyperBatch::default)
    }

    fn point_indexer(&self, partitions: usize) -> Box<dyn PointIndexer<HyperPoint>> {
        indexer_for(partitions)
    }

    fn processor(&self) -> LoadResult<Self::Processor> {
        Ok(BackoffProcessor::new(
            PromWriter::new(self.client.clone(), self.target.clone()),
            processor_options(&self.target, self.limiter.clone()),
        ))
    }
}

pub struct PrometheusTarget;

#[async_trait]
impl Target for PrometheusTarget {
    fn name(&self) -> &'static str {
        "prometheus"
    }

    fn description(&self) -> &'static str {
        "Prometheus text exposition pushed to an import endpoint"
    }

    async fn load(&self, config: &TsbenchConfig, runner: BenchmarkRunner) -> TargetResult<RunSummary> {
        let bench = PromBenchmark::new(config)?;
        Ok(runner.run(bench).await?)
    }

    fn generate(&self, config: &SimulatorConfig, out: &mut dyn Write) -> TargetResult<u64> {
        Ok(generate(simulator_for(config)?, &HypertableSerializer, out)?)
    }
}
