//! Turning configuration into sources, limiters and endpoints

use super::http::endpoint;
use super::input::open_input;
use super::serialize::PointSerializer;
use super::sim_source::SimulationDataSource;
use super::simulator::simulator_for;
use std::io::BufRead;
use std::sync::Arc;
use tracing::info;
use tsbench_config::{DataSourceConfig, DataSourceType, TargetConfig};
use tsbench_interfaces::{DataSource, LoadError, LoadResult};
use tsbench_load::ProcessorOptions;
use tsbench_resilience::RateLimiter;
use url::Url;

pub type BoxedSource<P> = Box<dyn DataSource<Point = P>>;

/// File replay or simulation, as configured
///
/// `file` wraps the opened input in the target's file reader; `serializer`
/// shapes simulator output into the same points.
pub fn select_source<Z, F>(config: &DataSourceConfig, serializer: Z, file: F) -> LoadResult<BoxedSource<Z::Point>>
where
    Z: PointSerializer,
    F: FnOnce(Box<dyn BufRead + Send>) -> BoxedSource<Z::Point>,
{
    match config.kind {
        DataSourceType::File => {
            let location = if config.file.is_stdin() {
                "stdin"
            } else {
                config.file.location.as_str()
            };
            info!("Reading points from {}", location);
            Ok(file(open_input(&config.file)?))
        }
        DataSourceType::Simulator => {
            let simulator = simulator_for(&config.simulator)?;
            info!(
                "Simulating {} with {} hosts",
                config.simulator.use_case, config.simulator.scale
            );
            Ok(Box::new(SimulationDataSource::new(simulator, serializer)))
        }
    }
}

/// One limiter shared by every worker, when enabled
pub fn shared_limiter(target: &TargetConfig) -> Option<Arc<RateLimiter>> {
    target
        .limiter
        .enabled
        .then(|| Arc::new(RateLimiter::new(target.limiter.max_rate, target.limiter.bucket_size)))
}

pub fn processor_options(target: &TargetConfig, limiter: Option<Arc<RateLimiter>>) -> ProcessorOptions {
    ProcessorOptions::new(target.backoff).with_limiter(limiter)
}

/// Write endpoint of `worker`: its round-robin base URL plus the configured
/// or default path
pub fn worker_endpoint(target: &TargetConfig, worker: usize, default_path: &str) -> LoadResult<Url> {
    let base = target
        .url_for_worker(worker)
        .ok_or_else(|| LoadError::Config("no target urls configured".to_string()))?;
    endpoint(base, target.write_path.as_deref().unwrap_or(default_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{LineFileSource, LineProtocolSerializer, LinePoint};
    use std::io::Write;
    use tsbench_config::{FileSourceConfig, SimulatorConfig};

    #[test]
    fn test_worker_endpoint_round_robin() {
        let target = TargetConfig {
            urls: vec!["http://a:8086".to_string(), "http://b:8086/".to_string()],
            ..Default::default()
        };
        assert_eq!(worker_endpoint(&target, 0, "/write").unwrap().as_str(), "http://a:8086/write");
        assert_eq!(worker_endpoint(&target, 1, "/write").unwrap().as_str(), "http://b:8086/write");
        assert_eq!(worker_endpoint(&target, 2, "/write").unwrap().as_str(), "http://a:8086/write");

        let custom = TargetConfig {
            write_path: Some("/api/v2/write".to_string()),
            ..target
        };
        assert_eq!(worker_endpoint(&custom, 0, "/write").unwrap().path(), "/api/v2/write");

        let empty = TargetConfig {
            urls: Vec::new(),
            ..Default::default()
        };
        assert_eq!(worker_endpoint(&empty, 0, "/write").unwrap_err().stage(), "config");
    }

    #[test]
    fn test_limiter_only_when_enabled() {
        let mut target = TargetConfig::default();
        assert!(shared_limiter(&target).is_none());
        target.limiter.enabled = true;
        assert!(shared_limiter(&target).is_some());
    }

    fn line_file(reader: Box<dyn BufRead + Send>) -> BoxedSource<LinePoint> {
        Box::new(LineFileSource::new(reader))
    }

    #[test]
    fn test_select_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cpu,host=a usage=1 1").unwrap();

        let config = DataSourceConfig {
            kind: DataSourceType::File,
            file: FileSourceConfig {
                location: file.path().display().to_string(),
            },
            ..Default::default()
        };
        let mut source = select_source(&config, LineProtocolSerializer, line_file).unwrap();
        assert_eq!(source.next_item().unwrap().unwrap().as_str(), "cpu,host=a usage=1 1");
        assert!(source.next_item().unwrap().is_none());
    }

    #[test]
    fn test_select_simulator() {
        let config = DataSourceConfig {
            kind: DataSourceType::Simulator,
            simulator: SimulatorConfig {
                max_data_points: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut source = select_source(&config, LineProtocolSerializer, line_file).unwrap();
        let mut count = 0;
        while source.next_item().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }
}
