//! CLI argument parsing definitions

use clap::{Args, Parser, Subcommand};
use humantime_serde::re::humantime;
use std::path::PathBuf;
use std::time::Duration;
use tsbench_config::{DataSourceType, TsbenchConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load points into a target
    Load(LoadArgs),

    /// Write simulated points in a target's file format
    Generate(GenerateArgs),

    /// List the available targets
    Targets,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct LoadArgs {
    /// Target to load (see `tsbench targets`)
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,

    /// Comma-separated backend URLs, assigned to workers round-robin
    #[arg(long, value_name = "URLS", value_delimiter = ',')]
    pub urls: Vec<String>,

    /// Database to load into
    #[arg(long, value_name = "NAME")]
    pub db_name: Option<String>,

    /// Number of concurrent workers
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Points per batch
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Stop after reading this many points
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    /// Give every worker its own queue, partitioned by series
    #[arg(long)]
    pub hash_workers: bool,

    /// Read and batch points without sending them
    #[arg(long)]
    pub no_load: bool,

    /// Load into the database as it is
    #[arg(long)]
    pub no_create_db: bool,

    /// Fail instead of dropping an existing database
    #[arg(long)]
    pub abort_on_exist: bool,

    /// Replay this file (`-` for stdin)
    #[arg(long, value_name = "PATH", conflicts_with = "simulate")]
    pub file: Option<String>,

    /// Load simulated points instead of a file
    #[arg(long)]
    pub simulate: bool,

    /// Time between progress lines, 0 disables them
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub reporting_period: Option<Duration>,

    /// Stop reading after this long
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub max_run_time: Option<Duration>,

    /// Sleep between resends of a pushed-back batch
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub backoff: Option<Duration>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl LoadArgs {
    /// Layer the flags over a loaded configuration
    pub fn apply(&self, config: &mut TsbenchConfig) {
        if let Some(target) = &self.target {
            config.target.name = target.clone();
        }
        if !self.urls.is_empty() {
            config.target.urls = self.urls.clone();
        }
        if let Some(backoff) = self.backoff {
            config.target.backoff = backoff;
        }

        let runner = &mut config.runner;
        if let Some(db_name) = &self.db_name {
            runner.db_name = db_name.clone();
        }
        if let Some(workers) = self.workers {
            runner.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            runner.batch_size = batch_size;
        }
        if let Some(limit) = self.limit {
            runner.limit = limit;
        }
        if let Some(period) = self.reporting_period {
            runner.reporting_period = period;
        }
        if let Some(max_run_time) = self.max_run_time {
            runner.max_run_time = Some(max_run_time);
        }
        runner.hash_workers |= self.hash_workers;
        runner.do_load &= !self.no_load;
        runner.do_create_db &= !self.no_create_db;
        runner.do_abort_on_exist |= self.abort_on_exist;

        if let Some(file) = &self.file {
            config.data_source.kind = DataSourceType::File;
            config.data_source.file.location = file.clone();
        }
        if self.simulate {
            config.data_source.kind = DataSourceType::Simulator;
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Target whose file format is written
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,

    /// Output file, stdout when omitted
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Number of simulated hosts
    #[arg(long, value_name = "N")]
    pub scale: Option<u64>,

    /// Random seed
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Stop after this many points
    #[arg(long, value_name = "N")]
    pub max_points: Option<u64>,
}

impl GenerateArgs {
    pub fn apply(&self, config: &mut TsbenchConfig) {
        if let Some(target) = &self.target {
            config.target.name = target.clone();
        }
        let simulator = &mut config.data_source.simulator;
        if let Some(scale) = self.scale {
            simulator.scale = scale;
        }
        if let Some(seed) = self.seed {
            simulator.seed = seed;
        }
        if let Some(max_points) = self.max_points {
            simulator.max_data_points = max_points;
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Print a sample configuration, or write it to a file
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
