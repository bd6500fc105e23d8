//! Targets addressable by name

use crate::error::{TargetError, TargetResult};
use crate::influx::InfluxTarget;
use crate::prometheus::PrometheusTarget;
use crate::victoriametrics::VictoriaMetricsTarget;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;
use tsbench_config::{SimulatorConfig, TsbenchConfig};
use tsbench_load::{BenchmarkRunner, RunSummary};

/// A backend tsbench can load
#[async_trait]
pub trait Target: Send + Sync {
    /// Name used in configuration and on the command line
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Load the configured data into the backend with `runner`
    async fn load(&self, config: &TsbenchConfig, runner: BenchmarkRunner) -> TargetResult<RunSummary>;

    /// Write simulated data in this target's replay format, returning the
    /// number of points written
    fn generate(&self, config: &SimulatorConfig, out: &mut dyn Write) -> TargetResult<u64>;
}

#[derive(Default)]
pub struct TargetRegistry {
    targets: BTreeMap<&'static str, Arc<dyn Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every target shipped with tsbench
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let builtin: [Arc<dyn Target>; 3] = [
            Arc::new(InfluxTarget),
            Arc::new(VictoriaMetricsTarget),
            Arc::new(PrometheusTarget),
        ];
        for target in builtin {
            // Names are distinct
            let _ = registry.register(target);
        }
        registry
    }

    pub fn register(&mut self, target: Arc<dyn Target>) -> TargetResult<()> {
        let name = target.name();
        if self.targets.contains_key(name) {
            return Err(TargetError::AlreadyRegistered(name.to_string()));
        }
        debug!("Registered target {}", name);
        self.targets.insert(name, target);
        Ok(())
    }

    pub fn get(&self, name: &str) -> TargetResult<Arc<dyn Target>> {
        self.targets
            .get(name)
            .cloned()
            .ok_or_else(|| TargetError::UnknownTarget {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    /// Registered names in alphabetical order
    pub fn names(&self) -> Vec<&'static str> {
        self.targets.keys().copied().collect()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Arc<dyn Target>> {
        self.targets.values()
    }
}
