//! Integration tests for configuration loading

use fallguard::domain::types::SensorKind;
use fallguard::infra::{Config, SmsMode};
use fallguard::io::SensorDelay;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[device]
id = "test-phone"

[sensor]
trace_file = "traces/test.jsonl"
delay = "fastest"
loop = true
kinds = ["accel"]
buffer = 32

[classifier]
impact_threshold = 25.0
rotation_threshold = 6.5
still_threshold = 0.8

[contacts]
store_file = "/tmp/prefs.json"
country_code = "354"
national_len = 7

[sms]
mode = "http"
http_url = "http://sms-gw.local/send"
auth_token = "secret"
timeout_ms = 1500
permission_granted = false

[location]
network_lat = 64.1466
network_lon = -21.9426

[faces]
compare_size = 32

[metrics]
interval_secs = 30
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.device_id(), "test-phone");
    assert_eq!(config.sensor_trace_file(), "traces/test.jsonl");
    assert_eq!(config.sensor_delay(), SensorDelay::Fastest);
    assert!(config.sensor_loop());
    assert_eq!(config.sensor_kinds(), &[SensorKind::Acceleration]);
    assert_eq!(config.sensor_buffer(), 32);
    assert_eq!(config.thresholds().impact, 25.0);
    assert_eq!(config.thresholds().rotation, 6.5);
    assert_eq!(config.thresholds().still, 0.8);
    assert_eq!(config.dialing_plan().country_code, "354");
    assert_eq!(config.dialing_plan().national_len, 7);
    assert_eq!(config.sms_mode(), SmsMode::Http);
    assert_eq!(config.sms_auth_token(), Some("secret"));
    assert_eq!(config.sms_timeout_ms(), 1500);
    assert!(!config.sms_permission_granted());
    assert_eq!(config.network_fix(), Some((64.1466, -21.9426)));
    assert_eq!(config.face_compare_size(), 32);
    assert_eq!(config.metrics_interval_secs(), 30);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_partial_config_uses_defaults() {
    let temp_file = write_config(
        r#"
[classifier]
impact_threshold = 30.0
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.thresholds().impact, 30.0);
    assert_eq!(config.thresholds().still, 1.0);
    assert_eq!(config.sms_mode(), SmsMode::Outbox);
    assert_eq!(config.dialing_plan().country_code, "91");
    assert_eq!(config.sensor_kinds().len(), 2);
    assert_eq!(config.sensor_delay(), SensorDelay::Normal);
}

#[test]
fn test_invalid_thresholds_rejected() {
    let temp_file = write_config(
        r#"
[classifier]
impact_threshold = 1.0
still_threshold = 2.0
"#,
    );

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("still_threshold"));
}

#[test]
fn test_unknown_sms_mode_rejected() {
    let temp_file = write_config(
        r#"
[sms]
mode = "carrier-pigeon"
"#,
    );

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.device_id(), "fallguard");
    assert_eq!(config.config_file(), "default");
    assert_eq!(config.sms_mode(), SmsMode::Outbox);
}

#[test]
fn test_repo_dev_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml");
    let config = Config::from_file(path).unwrap();
    assert_eq!(config.device_id(), "dev-phone");
    assert_eq!(config.sensor_delay(), SensorDelay::Game);
}
