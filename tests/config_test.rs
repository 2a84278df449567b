//! Config file loading tests

use std::time::Duration;

use cloudpark_monitor::{MonitorConfig, MonitorError};
use tempfile::TempDir;

#[test]
fn test_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = MonitorConfig::load(dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.api.base_url, "http://localhost:8000/api/v1");
    assert_eq!(config.poll_interval(), Duration::from_secs(10));
    assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
}

#[test]
fn test_full_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cloudpark-monitor.toml");
    std::fs::write(
        &path,
        r#"
[api]
base_url = "https://park.example.com/api/v1"
token = "secret"
request_timeout_secs = 5

[events]
url = "wss://park.example.com/ws/spots"
reconnect_delay_ms = 1500

[sync]
poll_interval_secs = 30
"#,
    )
    .unwrap();

    let config = MonitorConfig::load(&path).unwrap();

    assert_eq!(config.api.token.as_deref(), Some("secret"));
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.events.url, "wss://park.example.com/ws/spots");
    assert_eq!(config.reconnect_delay(), Duration::from_millis(1500));
    assert_eq!(config.poll_interval(), Duration::from_secs(30));
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[sync\npoll_interval_secs = ").unwrap();

    let result = MonitorConfig::load(&path);
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[test]
fn test_wrong_type_is_config_error() {
    let result = MonitorConfig::from_toml("[sync]\npoll_interval_secs = \"often\"\n");
    assert!(matches!(result, Err(MonitorError::Config(_))));
}
