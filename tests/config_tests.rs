use gulpd::config::types::{ParseErrorStrategy, StoreType};
use gulpd::config::{generate::generate_starter_config, load_config, ConfigError};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_content = generate_starter_config().replace("$env{HOME}", "/tmp");
    fs::write(&config_path, config_content).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.sources.len(), 4);
    assert_eq!(config.sources[0].id, "corr17");
    assert_eq!(config.sources[3].listen.port(), 5020);
    assert_eq!(config.thresholds.max_ncl, 10);
    assert_eq!(config.trigger.debounce, Duration::from_secs(60));
    assert_eq!(config.trigger.window_capacity, 10);
    assert!(!config.trigger.enabled);
    assert_eq!(config.store.store_type, StoreType::Memory);
    assert_eq!(config.pipeline.errors.on_parse_error, ParseErrorStrategy::Drop);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    fs::write(
        &config_path,
        r#"
sources:
  - id: corr17
    listen: 127.0.0.1:5017
thresholds:
  min_snr: 8.5
  min_snr_wide: 9.5
  wide_ibox: 17
  max_ibox: 33
  min_snr_t2out: 8.0
  max_ncl: 10
  max_ctb0: 8
  max_ctb: 10
"#,
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.thresholds.min_dm, 50.0);
    assert_eq!(config.thresholds.gal_dm_factor, 0.75);
    assert!(config.output.root.is_none());
    assert_eq!(config.store.keys.config_key, "/cnf/t2");
    assert_eq!(config.store.keys.status_prefix, "/mon/T2");
    assert_eq!(config.status.process_id, 1);
    assert_eq!(config.sync.max_payload_bytes, 100_000_000);
}

#[test]
fn test_invalid_config_reports_every_problem() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    fs::write(
        &config_path,
        r#"
sources:
  - id: corr17
    listen: 127.0.0.1:5017
  - id: corr17
    listen: 127.0.0.1:5017
thresholds:
  min_snr: -1.0
  min_snr_wide: 9.5
  wide_ibox: 40
  max_ibox: 33
  min_snr_t2out: 8.0
  max_ncl: 0
  max_ctb0: 8
  max_ctb: 10
store:
  type: etcd
"#,
    )
    .unwrap();

    match load_config(&config_path) {
        Err(ConfigError::ValidationList(errors)) => {
            let joined = errors.join("\n");
            assert!(joined.contains("duplicate source ID 'corr17'"));
            assert!(joined.contains("used by another source"));
            assert!(joined.contains("thresholds.min_snr"));
            assert!(joined.contains("max_ncl"));
            assert!(joined.contains("wide_ibox"));
            assert!(joined.contains("endpoint"));
        }
        other => panic!("expected validation errors, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = load_config(&temp_dir.path().join("absent.yml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
