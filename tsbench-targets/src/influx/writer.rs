//! Line protocol writes to InfluxDB's `/write` endpoint

use crate::common::http::{post_body, status_error};
use crate::common::setup::worker_endpoint;
use crate::common::LineBatch;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use tsbench_config::TargetConfig;
use tsbench_interfaces::{BatchWriter, LoadError, LoadResult, WorkerContext};
use url::Url;

pub const DEFAULT_WRITE_PATH: &str = "/write";

/// Response bodies that mean "slow down" rather than "rejected"
const BACKPRESSURE_MARKERS: [&str; 3] = [
    "hinted handoff queue not empty",
    "engine: cache maximum memory size exceeded",
    "cache-max-memory-size exceeded",
];

/// Whether a non-204 answer asks the client to back off
pub fn is_backpressure(status: StatusCode, body: &str) -> bool {
    status == StatusCode::SERVICE_UNAVAILABLE || BACKPRESSURE_MARKERS.iter().any(|marker| body.contains(marker))
}

pub struct InfluxWriter {
    client: reqwest::Client,
    target: TargetConfig,
    url: Option<Url>,
}

impl InfluxWriter {
    pub fn new(client: reqwest::Client, target: TargetConfig) -> Self {
        Self {
            client,
            target,
            url: None,
        }
    }

    /// Write URL, set once connected
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

#[async_trait]
impl BatchWriter for InfluxWriter {
    type Batch = LineBatch;

    async fn connect(&mut self, ctx: &WorkerContext) -> LoadResult<()> {
        let mut url = worker_endpoint(&self.target, ctx.worker, DEFAULT_WRITE_PATH)?;
        url.query_pairs_mut()
            .append_pair("db", &ctx.db_name)
            .append_pair("consistency", &self.target.consistency);
        debug!("[worker {}] writing to {}", ctx.worker, url);
        self.url = Some(url);
        Ok(())
    }

    async fn write(&self, batch: &LineBatch) -> LoadResult<()> {
        let url = self
            .url
            .as_ref()
            .ok_or_else(|| LoadError::Internal("influx writer used before connect".to_string()))?;

        let (status, text) = post_body(
            &self.client,
            url,
            batch.as_bytes(),
            "text/plain; charset=utf-8",
            self.target.gzip,
        )
        .await?;
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        if is_backpressure(status, &text) {
            return Err(LoadError::Backpressure);
        }
        Err(status_error(url, status, &text))
    }
}
