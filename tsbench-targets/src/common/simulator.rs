//! Synthetic data generation

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tsbench_config::SimulatorConfig;
use tsbench_interfaces::{LoadError, LoadResult, SchemaHeader};

/// One generated reading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimPoint {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
    pub timestamp: DateTime<Utc>,
}

impl SimPoint {
    pub fn reset(&mut self) {
        self.measurement.clear();
        self.tags.clear();
        self.fields.clear();
        self.timestamp = DateTime::<Utc>::default();
    }

    /// Timestamp in nanoseconds since the epoch
    pub fn unix_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// A deterministic stream of readings
pub trait Simulator: Send {
    fn headers(&self) -> SchemaHeader;

    /// Fill `point` with the next reading; false when the current host is
    /// not due yet and nothing was written
    fn next(&mut self, point: &mut SimPoint) -> bool;

    fn finished(&self) -> bool;
}

/// Simulator for the configured use case
pub fn simulator_for(config: &SimulatorConfig) -> LoadResult<Box<dyn Simulator>> {
    match config.use_case.as_str() {
        "cpu-only" => Ok(Box::new(CpuOnlySimulator::new(config)?)),
        other => Err(LoadError::Config(format!("unknown use case '{}'", other))),
    }
}

const CPU_MEASUREMENT: &str = "cpu";

const CPU_FIELDS: [&str; 10] = [
    "usage_user",
    "usage_system",
    "usage_idle",
    "usage_nice",
    "usage_iowait",
    "usage_irq",
    "usage_softirq",
    "usage_steal",
    "usage_guest",
    "usage_guest_nice",
];

const HOST_TAGS: [&str; 10] = [
    "hostname",
    "region",
    "datacenter",
    "rack",
    "os",
    "arch",
    "team",
    "service",
    "service_version",
    "service_environment",
];

const REGIONS: [(&str, &[&str]); 9] = [
    ("us-east-1", &["us-east-1a", "us-east-1b", "us-east-1c", "us-east-1e"]),
    ("us-west-1", &["us-west-1a", "us-west-1b"]),
    ("us-west-2", &["us-west-2a", "us-west-2b", "us-west-2c"]),
    ("eu-west-1", &["eu-west-1a", "eu-west-1b", "eu-west-1c"]),
    ("eu-central-1", &["eu-central-1a", "eu-central-1b"]),
    ("ap-southeast-1", &["ap-southeast-1a", "ap-southeast-1b"]),
    ("ap-southeast-2", &["ap-southeast-2a", "ap-southeast-2b"]),
    ("ap-northeast-1", &["ap-northeast-1a", "ap-northeast-1c"]),
    ("sa-east-1", &["sa-east-1a", "sa-east-1b", "sa-east-1c"]),
];

const OS: [&str; 3] = ["Ubuntu16.10", "Ubuntu16.04LTS", "Ubuntu15.10"];
const ARCH: [&str; 2] = ["x64", "x86"];
const TEAMS: [&str; 4] = ["SF", "NYC", "LON", "CHI"];
const ENVIRONMENTS: [&str; 3] = ["production", "staging", "test"];

/// Hosts start reporting within this many intervals of the window start
const MAX_START_OFFSET_INTERVALS: i32 = 3;

#[derive(Debug)]
struct Host {
    tags: Vec<(String, String)>,
    usage: [f64; 10],
    first_reading: DateTime<Utc>,
}

impl Host {
    fn new(id: u64, start: DateTime<Utc>, interval: ChronoDuration, rng: &mut StdRng) -> Self {
        let (region, datacenters) = REGIONS[rng.random_range(0..REGIONS.len())];
        let datacenter = datacenters[rng.random_range(0..datacenters.len())];
        let values = [
            format!("host_{}", id),
            region.to_string(),
            datacenter.to_string(),
            rng.random_range(0..100u32).to_string(),
            OS[rng.random_range(0..OS.len())].to_string(),
            ARCH[rng.random_range(0..ARCH.len())].to_string(),
            TEAMS[rng.random_range(0..TEAMS.len())].to_string(),
            rng.random_range(0..20u32).to_string(),
            rng.random_range(0..2u32).to_string(),
            ENVIRONMENTS[rng.random_range(0..ENVIRONMENTS.len())].to_string(),
        ];
        let tags = HOST_TAGS
            .iter()
            .zip(values)
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        let mut usage = [0.0; 10];
        for value in usage.iter_mut() {
            *value = rng.random_range(0.0..100.0);
        }

        // The first host always reports from the start
        let offset = if id == 0 {
            0
        } else {
            rng.random_range(0..MAX_START_OFFSET_INTERVALS)
        };

        Self {
            tags,
            usage,
            first_reading: start + interval * offset,
        }
    }

    /// Random walk within [0, 100]
    fn advance(&mut self, rng: &mut StdRng) {
        for value in self.usage.iter_mut() {
            *value = (*value + rng.random_range(-1.0..=1.0)).clamp(0.0, 100.0);
        }
    }
}

/// `scale` hosts each reporting one `cpu` reading per interval
#[derive(Debug)]
pub struct CpuOnlySimulator {
    hosts: Vec<Host>,
    rng: StdRng,
    interval: ChronoDuration,
    now: DateTime<Utc>,
    end: DateTime<Utc>,
    cursor: usize,
    emitted: u64,
    max_points: u64,
}

impl CpuOnlySimulator {
    pub fn new(config: &SimulatorConfig) -> LoadResult<Self> {
        if config.scale == 0 {
            return Err(LoadError::Config("simulator scale must be at least 1".to_string()));
        }
        let interval = ChronoDuration::from_std(config.log_interval)
            .ok()
            .filter(|d| *d > ChronoDuration::zero())
            .ok_or_else(|| LoadError::Config(format!("invalid log interval {:?}", config.log_interval)))?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let hosts = (0..config.scale)
            .map(|id| Host::new(id, config.timestamp_start, interval, &mut rng))
            .collect();

        Ok(Self {
            hosts,
            rng,
            interval,
            now: config.timestamp_start,
            end: config.timestamp_end,
            cursor: 0,
            emitted: 0,
            max_points: config.max_data_points,
        })
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Simulator for CpuOnlySimulator {
    fn headers(&self) -> SchemaHeader {
        let header = HOST_TAGS
            .iter()
            .fold(SchemaHeader::new(), |header, tag| header.with_tag(*tag, "string"));
        header.with_measurement(CPU_MEASUREMENT, CPU_FIELDS)
    }

    fn next(&mut self, point: &mut SimPoint) -> bool {
        if self.finished() {
            return false;
        }

        let host = &mut self.hosts[self.cursor];
        let due = host.first_reading <= self.now;
        if due {
            point.measurement.clear();
            point.measurement.push_str(CPU_MEASUREMENT);
            point.tags.clone_from(&host.tags);
            point.fields.clear();
            point
                .fields
                .extend(CPU_FIELDS.iter().zip(host.usage).map(|(k, v)| (k.to_string(), v)));
            point.timestamp = self.now;
            host.advance(&mut self.rng);
            self.emitted += 1;
        }

        self.cursor += 1;
        if self.cursor == self.hosts.len() {
            self.cursor = 0;
            self.now += self.interval;
        }
        due
    }

    fn finished(&self) -> bool {
        self.now >= self.end || (self.max_points > 0 && self.emitted >= self.max_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn config(scale: u64, minutes: i64) -> SimulatorConfig {
        let start = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        SimulatorConfig {
            scale,
            timestamp_start: start,
            timestamp_end: start + ChronoDuration::minutes(minutes),
            log_interval: Duration::from_secs(10),
            ..Default::default()
        }
    }

    fn drain(sim: &mut dyn Simulator) -> Vec<SimPoint> {
        let mut points = Vec::new();
        let mut point = SimPoint::default();
        while !sim.finished() {
            if sim.next(&mut point) {
                points.push(point.clone());
            }
        }
        points
    }

    #[test]
    fn test_single_host_reports_every_interval() {
        let mut sim = CpuOnlySimulator::new(&config(1, 1)).unwrap();
        let points = drain(&mut sim);

        assert_eq!(points.len(), 6);
        assert_eq!(points[0].tags.len(), 10);
        assert_eq!(points[0].tags[0], ("hostname".to_string(), "host_0".to_string()));
        assert_eq!(points[0].fields.len(), 10);
        assert_eq!(points[1].timestamp - points[0].timestamp, ChronoDuration::seconds(10));
        assert!(points
            .iter()
            .flat_map(|p| p.fields.iter())
            .all(|(_, v)| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_same_seed_same_data() {
        let a = drain(&mut CpuOnlySimulator::new(&config(5, 2)).unwrap());
        let b = drain(&mut CpuOnlySimulator::new(&config(5, 2)).unwrap());
        assert_eq!(a, b);

        let other = SimulatorConfig { seed: 7, ..config(5, 2) };
        assert_ne!(a, drain(&mut CpuOnlySimulator::new(&other).unwrap()));
    }

    #[test]
    fn test_late_hosts_are_skipped_until_due() {
        let mut sim = CpuOnlySimulator::new(&config(50, 10)).unwrap();
        let start = sim.now;
        let points = drain(&mut sim);

        let first_tick = points.iter().filter(|p| p.timestamp == start).count();
        assert!(first_tick >= 1 && first_tick < 50);
        // Everyone reports once the offsets have passed
        let late_tick = start + ChronoDuration::seconds(10 * MAX_START_OFFSET_INTERVALS as i64);
        assert_eq!(points.iter().filter(|p| p.timestamp == late_tick).count(), 50);
    }

    #[test]
    fn test_max_data_points() {
        let capped = SimulatorConfig {
            max_data_points: 7,
            ..config(3, 60)
        };
        let mut sim = CpuOnlySimulator::new(&capped).unwrap();
        assert_eq!(drain(&mut sim).len(), 7);
        assert_eq!(sim.emitted(), 7);
    }

    #[test]
    fn test_headers_and_factory() {
        let sim = simulator_for(&config(1, 1)).unwrap();
        let header = sim.headers();
        assert_eq!(header.tag_keys.len(), 10);
        assert_eq!(header.fields("cpu").unwrap().len(), 10);

        let unknown = SimulatorConfig {
            use_case: "devops".to_string(),
            ..config(1, 1)
        };
        assert_eq!(simulator_for(&unknown).err().unwrap().stage(), "config");
    }
}
