// Integration test for configuration file support

use logfwd::config::{ForwarderConfig, SinkTarget};
use logfwd::error::ForwarderError;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_toml_config_with_tcp_sink() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.toml");

    let toml_content = r#"
        sink_host = "collector.internal"
        sink_port = 5140
        whitelist = ["MARATHON_APP_ID", "TEAM"]
        log_path_key = "APP_LOG"

        [reconnect]
        initial_delay_ms = 100
        max_delay_ms = 2000

        [reattach]
        initial_delay_ms = 50
        max_delay_ms = 800
    "#;

    fs::write(&config_path, toml_content).unwrap();

    let config = ForwarderConfig::from_file(&config_path).unwrap();
    assert_eq!(config.whitelist, vec!["MARATHON_APP_ID", "TEAM"]);
    assert_eq!(config.log_path_key, "APP_LOG");
    assert_eq!(config.app_id_key, "MARATHON_APP_ID");
    assert_eq!(config.reconnect.initial_delay_ms, 100);
    assert_eq!(config.reattach.map(|r| r.max_delay_ms), Some(800));
    assert_eq!(
        config.sink_target(),
        SinkTarget::Tcp {
            host: "collector.internal".to_string(),
            port: 5140
        }
    );
}

#[test]
fn test_load_json_config_with_file_sink() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.json");

    let json_content = r#"{
        "whitelist": ["MARATHON_APP_ID"],
        "log_dir": "/var/log/containers"
    }"#;

    fs::write(&config_path, json_content).unwrap();

    let config = ForwarderConfig::from_file(&config_path).unwrap();
    assert_eq!(
        config.sink_target(),
        SinkTarget::Files {
            dir: PathBuf::from("/var/log/containers")
        }
    );
    assert!(config.reattach.is_none());
}

#[test]
fn test_log_dir_expands_environment_variables() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.toml");

    std::env::set_var("LOGFWD_TEST_LOG_ROOT", "/srv/logs");
    fs::write(&config_path, r#"log_dir = "${LOGFWD_TEST_LOG_ROOT}/fwd""#).unwrap();

    let config = ForwarderConfig::from_file(&config_path).unwrap();
    assert_eq!(config.log_dir, PathBuf::from("/srv/logs/fwd"));
}

#[test]
fn test_host_without_port_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.toml");

    fs::write(&config_path, r#"sink_host = "collector""#).unwrap();

    let result = ForwarderConfig::from_file(&config_path);
    assert!(matches!(result, Err(ForwarderError::MissingConfigField(field)) if field == "sink_port"));
}

#[test]
fn test_reattach_delays_must_be_ordered() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.toml");

    let toml_content = r#"
        [reattach]
        initial_delay_ms = 5000
        max_delay_ms = 10
    "#;
    fs::write(&config_path, toml_content).unwrap();

    let result = ForwarderConfig::from_file(&config_path);
    assert!(matches!(result, Err(ForwarderError::ConfigValidationError(_))));
}

#[test]
fn test_unsupported_extension() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.yaml");

    fs::write(&config_path, "sink_port: 1").unwrap();

    let result = ForwarderConfig::from_file(&config_path);
    assert!(matches!(result, Err(ForwarderError::InvalidConfig(_))));
}

#[test]
fn test_malformed_toml() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("logfwd.toml");

    fs::write(&config_path, "whitelist = [unterminated").unwrap();

    let result = ForwarderConfig::from_file(&config_path);
    assert!(matches!(result, Err(ForwarderError::InvalidConfig(_))));
}

#[test]
fn test_missing_file() {
    let result = ForwarderConfig::from_file(&PathBuf::from("/nonexistent/logfwd.toml"));
    assert!(matches!(result, Err(ForwarderError::ConfigError(_))));
}
