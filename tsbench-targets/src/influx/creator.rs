//! Database preparation over InfluxDB's `/query` endpoint

use crate::common::http::endpoint;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use tsbench_interfaces::{DbCreator, LoadError, LoadResult};
use url::Url;

const QUERY_PATH: &str = "/query";
const INTERNAL_DB: &str = "_internal";

/// Time InfluxDB gets to settle after dropping or creating a database
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

/// `{"results":[{"series":[{"name":"databases","columns":["name"],"values":[["_internal"],["benchmark"]]}]}]}`
#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    results: Vec<ListingResult>,
}

#[derive(Debug, Deserialize)]
struct ListingResult {
    #[serde(default)]
    series: Vec<ListingSeries>,
}

#[derive(Debug, Deserialize)]
struct ListingSeries {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct InfluxCreator {
    client: reqwest::Client,
    base_url: String,
    replication_factor: u32,
    settle: Duration,
}

impl InfluxCreator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, replication_factor: u32) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            replication_factor,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn query_url(&self, params: &[(&str, &str)]) -> LoadResult<Url> {
        let mut url = endpoint(&self.base_url, QUERY_PATH)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    /// Every database except `_internal`
    pub async fn list_databases(&self) -> LoadResult<Vec<String>> {
        let url = self.query_url(&[("q", "SHOW DATABASES")])?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| setup_error(&url, e))?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(LoadError::setup(format!(
                "listing databases returned {}: {}",
                status,
                body.trim()
            )));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| LoadError::setup(format!("cannot parse database listing: {}", e)))?;

        Ok(listing
            .results
            .into_iter()
            .next()
            .and_then(|result| result.series.into_iter().next())
            .map(|series| series.values)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|name| name != INTERNAL_DB)
            .collect())
    }

    async fn execute(&self, statement: String, action: &str) -> LoadResult<()> {
        let url = self.query_url(&[("consistency", "all"), ("q", &statement)])?;
        let response = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|e| setup_error(&url, e))?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(LoadError::setup(format!("{} returned non-200 code {}: {}", action, status, body.trim())));
        }
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

fn setup_error(url: &Url, e: reqwest::Error) -> LoadError {
    LoadError::setup(format!("request to {} failed: {}", url, e))
}

#[async_trait]
impl DbCreator for InfluxCreator {
    async fn db_exists(&self, db_name: &str) -> LoadResult<bool> {
        Ok(self.list_databases().await?.iter().any(|name| name == db_name))
    }

    async fn remove_old_db(&self, db_name: &str) -> LoadResult<()> {
        self.execute(format!("DROP DATABASE \"{}\"", db_name), "drop db").await?;
        info!("Dropped database '{}'", db_name);
        Ok(())
    }

    async fn create_db(&self, db_name: &str) -> LoadResult<()> {
        let statement = format!(
            "CREATE DATABASE \"{}\" WITH REPLICATION {}",
            db_name, self.replication_factor
        );
        self.execute(statement, "create db").await?;
        info!("Created database '{}'", db_name);
        Ok(())
    }
}
