//! fallguard - fall detection with SMS alerts to emergency contacts
//!
//! Replays motion samples through the impact-then-stillness classifier and,
//! on a fall, texts every emergency contact with the last known location.
//!
//! Module structure:
//! - `domain/` - Core types (samples, fall events, contacts, faces, alert text)
//! - `io/` - External interfaces (sensor, location, SMS, notices, preferences)
//! - `services/` - Business logic (classifier, fall monitor, alert worker, stores)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use fallguard::domain::types::LocationSource;
use fallguard::infra::{Config, Metrics, SmsMode};
use fallguard::io::notices::run_notice_logger;
use fallguard::io::{
    create_notice_channel, FixFileProvider, HttpSmsGateway, JsonFilePreferences,
    LastKnownLocation, OutboxSms, PreferenceStore, ReplaySource, SensorSubscription,
    SmsTransport, StaticProvider,
};
use fallguard::services::{
    create_alert_worker, AlertDispatcher, ContactBook, FaceStore, FallClassifier, FallMonitor,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Fall detection daemon
#[derive(Parser, Debug)]
#[command(name = "fallguard", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

/// Open each distinct preference file once so stores sharing a file share a cache
fn open_preferences(
    opened: &mut HashMap<String, Arc<JsonFilePreferences>>,
    path: &str,
) -> anyhow::Result<Arc<dyn PreferenceStore>> {
    if let Some(store) = opened.get(path) {
        return Ok(store.clone());
    }
    let store = Arc::new(JsonFilePreferences::open(path)?);
    opened.insert(path.to_string(), store.clone());
    Ok(store)
}

fn build_location(config: &Config) -> LastKnownLocation {
    let mut location = LastKnownLocation::default();
    if let Some(path) = config.gps_fix_file() {
        location =
            location.with_provider(Box::new(FixFileProvider::new(path, LocationSource::Gps)));
    }
    if let Some((lat, lon)) = config.network_fix() {
        location = location
            .with_provider(Box::new(StaticProvider::new(lat, lon, LocationSource::Network)));
    }
    location
}

fn build_transport(config: &Config) -> anyhow::Result<Arc<dyn SmsTransport>> {
    Ok(match config.sms_mode() {
        SmsMode::Outbox => Arc::new(OutboxSms::new(
            config.sms_outbox_file(),
            config.sms_permission_granted(),
        )),
        SmsMode::Http => Arc::new(HttpSmsGateway::new(
            config.sms_http_url(),
            config.sms_auth_token().map(str::to_string),
            Duration::from_millis(config.sms_timeout_ms()),
            config.sms_permission_granted(),
        )?),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-sample visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "fallguard starting");

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        device_id = %config.device_id(),
        trace_file = %config.sensor_trace_file(),
        delay = %config.sensor_delay().as_str(),
        thresholds = ?config.thresholds(),
        sms_mode = ?config.sms_mode(),
        sms_permission = %config.sms_permission_granted(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());

    // Persistent stores
    let mut opened = HashMap::new();
    let contacts_prefs = open_preferences(&mut opened, config.contacts_store_file())?;
    let contacts = Arc::new(ContactBook::load(contacts_prefs, config.dialing_plan().clone())?);
    if contacts.is_empty() {
        warn!("no_emergency_contacts_configured");
    }

    let faces_prefs = open_preferences(&mut opened, config.faces_store_file())?;
    let faces = FaceStore::new(faces_prefs, config.face_compare_size());
    match faces.saved_faces() {
        Ok(saved) => info!(count = %saved.len(), "saved_faces_loaded"),
        Err(e) => warn!(error = %e, "saved_faces_unreadable"),
    }

    // Notices
    let (notices, notice_rx) = create_notice_channel(64);
    let notice_task = tokio::spawn(run_notice_logger(notice_rx));

    // Alert path
    let location = Arc::new(build_location(&config));
    if location.is_empty() {
        warn!("no_location_providers: alerts will report Unknown");
    }
    let transport = build_transport(&config)?;
    let dispatcher = Arc::new(AlertDispatcher::new(
        contacts,
        location,
        transport,
        notices,
        metrics.clone(),
    ));
    let (alert_tx, alert_worker) =
        create_alert_worker(dispatcher, metrics.clone(), config.alert_buffer());
    let worker_task = tokio::spawn(alert_worker.run());

    // Sensor subscription
    let source = ReplaySource::open(config.sensor_trace_file(), config.sensor_loop())?;
    let (subscription, sample_rx) = SensorSubscription::register(
        source,
        config.sensor_kinds(),
        config.sensor_delay(),
        config.sensor_buffer(),
        metrics.clone(),
    );

    let classifier = FallClassifier::new(config.thresholds());
    let monitor = FallMonitor::new(classifier, alert_tx, metrics.clone());

    // Start metrics reporter (lock-free reads with full summary)
    let classifier_state = monitor.state_handle();
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    let reporter = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let armed = classifier_state.lock().is_armed();
            metrics_clone.report(armed).log();
        }
    });

    // Run the monitor until the trace ends or Ctrl+C
    let mut monitor_task = tokio::spawn(monitor.run(sample_rx));
    tokio::select! {
        result = &mut monitor_task => {
            if let Err(e) = result {
                error!(error = %e, "fall_monitor_failed");
            }
            subscription.release().await;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown_signal_received");
            // Releasing closes the sample channel; the monitor drains and exits
            subscription.release().await;
            if let Err(e) = monitor_task.await {
                error!(error = %e, "fall_monitor_failed");
            }
        }
    }

    // Monitor dropped its alert sender; let pending alerts finish
    if let Err(e) = worker_task.await {
        error!(error = %e, "alert_worker_failed");
    }
    reporter.abort();
    metrics.report(false).log();
    if let Err(e) = notice_task.await {
        error!(error = %e, "notice_logger_failed");
    }

    info!("fallguard shutdown complete");
    Ok(())
}
