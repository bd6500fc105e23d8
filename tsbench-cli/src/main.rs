mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands, GenerateArgs, LoadArgs};
use colored::Colorize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use tsbench_config::{ConfigError, ConfigLoader, LogLevel, TsbenchConfig};
use tsbench_load::{BenchmarkRunner, RunSummary};
use tsbench_logging::{init_logging_from_config, init_simple_tracing};
use tsbench_resilience::ShutdownCoordinator;
use tsbench_targets::{TargetError, TargetRegistry};

/// Load configuration from file or environment and apply `--log-level`
fn load_config(config_path: Option<&PathBuf>, log_level: Option<&str>) -> Result<TsbenchConfig> {
    let loader = ConfigLoader::new();
    let mut config = match config_path {
        Some(path) => loader
            .from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => loader
            .from_env()
            .context("Failed to load configuration from environment")?,
    };

    if let Some(level) = log_level {
        config.logging.level = LogLevel::from_str(level).map_err(anyhow::Error::msg)?;
    }
    Ok(config)
}

/// Stage an error belongs to, for the exit message
fn stage_of(error: &anyhow::Error) -> &'static str {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<TargetError>() {
            return e.stage();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return "config";
        }
    }
    "cli"
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let output = serde_json::to_string_pretty(summary).context("Failed to format summary as JSON")?;
        println!("{}", output);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

async fn handle_load(cli: &Cli, args: &LoadArgs) -> Result<()> {
    let mut config = load_config(cli.config.as_ref(), cli.log_level.as_deref())?;
    args.apply(&mut config);
    config.validate_all().context("Invalid configuration after applying flags")?;
    init_logging_from_config(&config.logging)?;

    let registry = TargetRegistry::with_builtin();
    let target = registry.get(&config.target.name)?;
    info!("Loading target '{}' ({})", target.name(), target.description());

    let shutdown = Arc::new(ShutdownCoordinator::new());
    let signals = shutdown.install_signal_handler();
    let runner = BenchmarkRunner::new(config.runner.clone()).with_shutdown(shutdown);

    let result = target.load(&config, runner).await;
    signals.abort();

    let summary = result?;
    info!(
        "Loaded {} rows, {} metrics in {:.3}sec",
        summary.rows,
        summary.metrics,
        summary.elapsed.as_secs_f64()
    );
    print_summary(&summary, args.json)
}

fn handle_generate(cli: &Cli, args: &GenerateArgs) -> Result<()> {
    let mut config = load_config(cli.config.as_ref(), cli.log_level.as_deref())?;
    args.apply(&mut config);
    config.validate_all().context("Invalid configuration after applying flags")?;
    init_logging_from_config(&config.logging)?;

    let registry = TargetRegistry::with_builtin();
    let target = registry.get(&config.target.name)?;

    let written = match &args.output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
            let mut out = BufWriter::new(file);
            let written = target.generate(&config.data_source.simulator, &mut out)?;
            out.flush().with_context(|| format!("Failed to write {:?}", path))?;
            written
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let written = target.generate(&config.data_source.simulator, &mut out)?;
            out.flush().context("Failed to write to stdout")?;
            written
        }
    };
    info!("Generated {} points for '{}'", written, target.name());
    Ok(())
}

fn handle_targets() -> Result<()> {
    let registry = TargetRegistry::with_builtin();
    for target in registry.targets() {
        println!("{:<16} {}", target.name().bold(), target.description());
    }
    Ok(())
}

fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);
    if !config_file.exists() {
        return Err(anyhow::anyhow!("Configuration file not found: {:?}", config_file));
    }

    ConfigLoader::new()
        .from_file(config_file)
        .with_context(|| format!("Configuration {:?} is invalid", config_file))?;
    println!("{} configuration file is valid", "ok:".green().bold());
    Ok(())
}

fn handle_config_generate(output: Option<&Path>, force: bool) -> Result<()> {
    let sample = TsbenchConfig::generate_sample();
    let Some(output) = output else {
        print!("{}", sample);
        return Ok(());
    };

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, sample).context("Failed to write configuration file")?;
    println!("{} configuration written to {:?}", "ok:".green().bold(), output);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Load(args)) => handle_load(&cli, args).await,
        Some(Commands::Generate(args)) => handle_generate(&cli, args),
        Some(Commands::Targets) => {
            init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            handle_targets()
        }
        Some(Commands::Config { config_cmd }) => {
            init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
            match config_cmd {
                ConfigCommands::Validate { config_file } => handle_config_validate(config_file),
                ConfigCommands::Generate { output, force } => handle_config_generate(output.as_deref(), *force),
            }
        }
        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("{:?}", e);
            eprintln!("{} [{}] {:#}", "error:".red().bold(), stage_of(&e), e);
            ExitCode::FAILURE
        }
    }
}
