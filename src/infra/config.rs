//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::contact::DialingPlan;
use crate::domain::types::SensorKind;
use crate::io::sensor::SensorDelay;
use crate::services::classifier::{
    Thresholds, DEFAULT_IMPACT_THRESHOLD, DEFAULT_ROTATION_THRESHOLD, DEFAULT_STILL_THRESHOLD,
};
use crate::services::face_store::DEFAULT_COMPARE_SIZE;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

const DEFAULT_PREFERENCES_FILE: &str = "data/preferences.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsMode {
    Outbox,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Identifier included in logs
    pub id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { id: "fallguard".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// JSONL trace replayed as the sensor source
    pub trace_file: String,
    pub delay: SensorDelay,
    /// Restart the trace when it ends
    #[serde(rename = "loop")]
    pub looping: bool,
    pub kinds: Vec<SensorKind>,
    /// Sample channel capacity
    pub buffer: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trace_file: "traces/demo.jsonl".to_string(),
            delay: SensorDelay::default(),
            looping: false,
            kinds: vec![SensorKind::Acceleration, SensorKind::AngularVelocity],
            buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub impact_threshold: f32,
    pub rotation_threshold: f32,
    pub still_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            impact_threshold: DEFAULT_IMPACT_THRESHOLD,
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD,
            still_threshold: DEFAULT_STILL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// Preference file holding the contact list
    pub store_file: String,
    pub country_code: String,
    pub national_len: usize,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        let plan = DialingPlan::default();
        Self {
            store_file: DEFAULT_PREFERENCES_FILE.to_string(),
            country_code: plan.country_code,
            national_len: plan.national_len,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub mode: SmsMode,
    /// JSONL outbox file (outbox mode)
    pub outbox_file: String,
    /// Gateway endpoint (http mode)
    pub http_url: String,
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
    /// Whether the device may send SMS
    pub permission_granted: bool,
    /// Pending alert queue capacity
    pub alert_buffer: usize,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            mode: SmsMode::Outbox,
            outbox_file: "sms_outbox.jsonl".to_string(),
            http_url: "http://localhost:8080/sms".to_string(),
            auth_token: None,
            timeout_ms: 5000,
            permission_granted: true,
            alert_buffer: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fix file written by the GPS daemon (primary)
    pub gps_fix_file: Option<String>,
    /// Static network fix (fallback)
    pub network_lat: Option<f64>,
    pub network_lon: Option<f64>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            gps_fix_file: Some("data/gps_fix.json".to_string()),
            network_lat: None,
            network_lon: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FacesConfig {
    pub store_file: String,
    pub compare_size: u32,
}

impl Default for FacesConfig {
    fn default() -> Self {
        Self {
            store_file: DEFAULT_PREFERENCES_FILE.to_string(),
            compare_size: DEFAULT_COMPARE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub contacts: ContactsConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub faces: FacesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    device_id: String,
    sensor_trace_file: String,
    sensor_delay: SensorDelay,
    sensor_loop: bool,
    sensor_kinds: Vec<SensorKind>,
    sensor_buffer: usize,
    thresholds: Thresholds,
    contacts_store_file: String,
    dialing_plan: DialingPlan,
    sms_mode: SmsMode,
    sms_outbox_file: String,
    sms_http_url: String,
    sms_auth_token: Option<String>,
    sms_timeout_ms: u64,
    sms_permission_granted: bool,
    alert_buffer: usize,
    gps_fix_file: Option<String>,
    network_fix: Option<(f64, f64)>,
    faces_store_file: String,
    face_compare_size: u32,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        let location = toml_config.location;
        let network_fix = location.network_lat.zip(location.network_lon);

        Self {
            device_id: toml_config.device.id,
            sensor_trace_file: toml_config.sensor.trace_file,
            sensor_delay: toml_config.sensor.delay,
            sensor_loop: toml_config.sensor.looping,
            sensor_kinds: toml_config.sensor.kinds,
            sensor_buffer: toml_config.sensor.buffer,
            thresholds: Thresholds {
                impact: toml_config.classifier.impact_threshold,
                rotation: toml_config.classifier.rotation_threshold,
                still: toml_config.classifier.still_threshold,
            },
            contacts_store_file: toml_config.contacts.store_file,
            dialing_plan: DialingPlan {
                country_code: toml_config.contacts.country_code,
                national_len: toml_config.contacts.national_len,
            },
            sms_mode: toml_config.sms.mode,
            sms_outbox_file: toml_config.sms.outbox_file,
            sms_http_url: toml_config.sms.http_url,
            sms_auth_token: toml_config.sms.auth_token,
            sms_timeout_ms: toml_config.sms.timeout_ms,
            sms_permission_granted: toml_config.sms.permission_granted,
            alert_buffer: toml_config.sms.alert_buffer,
            gps_fix_file: location.gps_fix_file,
            network_fix,
            faces_store_file: toml_config.faces.store_file,
            face_compare_size: toml_config.faces.compare_size,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: config_file.to_string(),
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        // Default to dev.toml
        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, &path.display().to_string());
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Reject settings the classifier or stores cannot work with
    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.thresholds;
        let named = [
            ("impact_threshold", t.impact),
            ("rotation_threshold", t.rotation),
            ("still_threshold", t.still),
        ];
        for (name, value) in named {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("{name} must be a positive number, got {value}");
            }
        }
        if t.still >= t.impact {
            anyhow::bail!(
                "still_threshold ({}) must be below impact_threshold ({})",
                t.still,
                t.impact
            );
        }
        if self.face_compare_size == 0 {
            anyhow::bail!("faces.compare_size must be greater than 0");
        }
        if self.dialing_plan.country_code.is_empty()
            || !self.dialing_plan.country_code.chars().all(|c| c.is_ascii_digit())
        {
            anyhow::bail!(
                "contacts.country_code must be digits, got {:?}",
                self.dialing_plan.country_code
            );
        }
        if self.metrics_interval_secs == 0 || self.alert_buffer == 0 {
            anyhow::bail!("metrics.interval_secs and sms.alert_buffer must be greater than 0");
        }
        if self.sensor_kinds.is_empty() {
            anyhow::bail!("sensor.kinds must name at least one sensor");
        }
        Ok(())
    }

    // Getters for all config fields
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn sensor_trace_file(&self) -> &str {
        &self.sensor_trace_file
    }

    pub fn sensor_delay(&self) -> SensorDelay {
        self.sensor_delay
    }

    pub fn sensor_loop(&self) -> bool {
        self.sensor_loop
    }

    pub fn sensor_kinds(&self) -> &[SensorKind] {
        &self.sensor_kinds
    }

    pub fn sensor_buffer(&self) -> usize {
        self.sensor_buffer
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn contacts_store_file(&self) -> &str {
        &self.contacts_store_file
    }

    pub fn dialing_plan(&self) -> &DialingPlan {
        &self.dialing_plan
    }

    pub fn sms_mode(&self) -> SmsMode {
        self.sms_mode
    }

    pub fn sms_outbox_file(&self) -> &str {
        &self.sms_outbox_file
    }

    pub fn sms_http_url(&self) -> &str {
        &self.sms_http_url
    }

    pub fn sms_auth_token(&self) -> Option<&str> {
        self.sms_auth_token.as_deref()
    }

    pub fn sms_timeout_ms(&self) -> u64 {
        self.sms_timeout_ms
    }

    pub fn sms_permission_granted(&self) -> bool {
        self.sms_permission_granted
    }

    pub fn alert_buffer(&self) -> usize {
        self.alert_buffer
    }

    pub fn gps_fix_file(&self) -> Option<&str> {
        self.gps_fix_file.as_deref()
    }

    /// Configured network fix as (lat, lon)
    pub fn network_fix(&self) -> Option<(f64, f64)> {
        self.network_fix
    }

    pub fn faces_store_file(&self) -> &str {
        &self.faces_store_file
    }

    pub fn face_compare_size(&self) -> u32 {
        self.face_compare_size
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set thresholds
    #[cfg(test)]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}
