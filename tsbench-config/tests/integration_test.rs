//! Integration tests for tsbench-config

use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;
use tsbench_config::*;

#[test]
fn test_default_config_validation() {
    let config = TsbenchConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("TSBENCH_WORKERS", Some("3")),
        ("TSBENCH_BATCH_SIZE", Some("250")),
        ("TSBENCH_DO_LOAD", Some("false")),
        ("TSBENCH_BACKOFF", Some("150ms")),
        ("TSBENCH_LOG_LEVEL", Some("debug")),
        ("TSBENCH_URLS", Some("http://a:8086, http://b:8086")),
        ("TSBENCH_TARGET", Some("victoriametrics")),
    ];

    with_vars(vars, || {
        let loader = ConfigLoader::new();
        let config = loader.from_env().unwrap();

        assert_eq!(config.runner.workers, 3);
        assert_eq!(config.runner.batch_size, 250);
        assert!(!config.runner.do_load);
        assert_eq!(config.target.backoff, Duration::from_millis(150));
        assert_eq!(config.target.name, "victoriametrics");
        assert_eq!(config.target.urls, vec!["http://a:8086", "http://b:8086"]);
        assert_eq!(config.logging.level, LogLevel::Debug);
    });
}

#[test]
fn test_invalid_env_override_is_rejected() {
    with_vars(vec![("TSBENCH_WORKERS", Some("many"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Env(ref msg) if msg.contains("WORKERS")));
    });

    with_vars(vec![("TSBENCH_MAX_RUN_TIME", Some("soon"))], || {
        assert!(ConfigLoader::new().from_env().is_err());
    });
}

#[test]
fn test_custom_prefix() {
    with_vars(vec![("LOADER_PARTITIONS", Some("8"))], || {
        let config = ConfigLoader::with_prefix("LOADER").from_env().unwrap();
        assert_eq!(config.runner.partitions, 8);
    });
}

#[test]
fn test_comprehensive_config() {
    let yaml = r#"
runner:
  db_name: metrics
  batch_size: 500
  workers: 4
  partitions: 4
  do_create_db: false
  reporting_period: 5s
  max_run_time: 10m

data_source:
  type: simulator
  simulator:
    scale: 10
    seed: 42
    log_interval: 10s

target:
  name: prometheus
  urls:
    - http://localhost:8428
  write_path: /api/v1/import/prometheus
  backoff: 500ms
  gzip: false

logging:
  level: warn
  format: json
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    // Hold the env lock so overrides from other tests cannot leak in
    let config = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_file(file.path()).unwrap()
    });
    assert_eq!(config.runner.db_name, "metrics");
    assert_eq!(config.runner.effective_partitions(), 4);
    assert_eq!(config.runner.reporting_period, Duration::from_secs(5));
    assert_eq!(config.runner.max_run_time, Some(Duration::from_secs(600)));
    assert_eq!(config.data_source.kind, DataSourceType::Simulator);
    assert_eq!(config.data_source.simulator.seed, 42);
    assert_eq!(config.target.write_path.as_deref(), Some("/api/v1/import/prometheus"));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"runner:\n  batch_size: 0\n").unwrap();

    let err = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_file(file.path()).unwrap_err()
    });
    assert!(matches!(err, ConfigError::Invalid { ref domain, .. } if domain == "runner"));
}

#[test]
fn test_load_without_path_uses_env() {
    with_vars(vec![("TSBENCH_DB_NAME", Some("from_env"))], || {
        let config = ConfigLoader::new().load(None::<&str>).unwrap();
        assert_eq!(config.runner.db_name, "from_env");
    });
}
