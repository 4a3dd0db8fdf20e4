//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::SensorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Acceleration samples delivered (monotonic)
    accel_samples_total: AtomicU64,
    /// Angular velocity samples delivered (monotonic)
    gyro_samples_total: AtomicU64,
    /// Samples dropped due to channel full (monotonic)
    samples_dropped: AtomicU64,
    /// Samples classified since last report (reset on report)
    classified_since_report: AtomicU64,
    /// Sum of classification latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max classification latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Classification latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Fall events emitted by the classifier (monotonic)
    falls_detected: AtomicU64,
    /// Alert commands dropped due to channel full (monotonic)
    alert_cmds_dropped: AtomicU64,
    /// Alerts sent to at least one contact attempt (monotonic)
    alerts_dispatched: AtomicU64,
    /// Alerts stopped before sending: no contacts or no permission (monotonic)
    alerts_suppressed: AtomicU64,
    /// Per-contact SMS sends that succeeded (monotonic)
    sms_sent: AtomicU64,
    /// Per-contact SMS sends that failed (monotonic)
    sms_failed: AtomicU64,
    /// Max alert queue delay in microseconds (reset on report)
    alert_queue_delay_max_us: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            accel_samples_total: AtomicU64::new(0),
            gyro_samples_total: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            classified_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            falls_detected: AtomicU64::new(0),
            alert_cmds_dropped: AtomicU64::new(0),
            alerts_dispatched: AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
            sms_sent: AtomicU64::new(0),
            sms_failed: AtomicU64::new(0),
            alert_queue_delay_max_us: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a sample handed to the classifier channel
    #[inline]
    pub fn record_sample(&self, kind: SensorKind) {
        let counter = match kind {
            SensorKind::Acceleration => &self.accel_samples_total,
            SensorKind::AngularVelocity => &self.gyro_samples_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sample_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sample was classified with given latency (lock-free)
    #[inline]
    pub fn record_classified(&self, latency_us: u64) {
        self.classified_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_fall_detected(&self) {
        self.falls_detected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert_cmd_dropped(&self) {
        self.alert_cmds_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert_dispatched(&self) {
        self.alerts_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_alert_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sms_result(&self, ok: bool) {
        if ok {
            self.sms_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.sms_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record time from alert enqueue to worker pickup
    #[inline]
    pub fn record_alert_queue_delay(&self, delay_us: u64) {
        update_atomic_max(&self.alert_queue_delay_max_us, delay_us);
    }

    pub fn samples_total(&self) -> u64 {
        self.accel_samples_total.load(Ordering::Relaxed)
            + self.gyro_samples_total.load(Ordering::Relaxed)
    }

    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped.load(Ordering::Relaxed)
    }

    pub fn falls_detected(&self) -> u64 {
        self.falls_detected.load(Ordering::Relaxed)
    }

    pub fn alert_cmds_dropped(&self) -> u64 {
        self.alert_cmds_dropped.load(Ordering::Relaxed)
    }

    pub fn alerts_dispatched(&self) -> u64 {
        self.alerts_dispatched.load(Ordering::Relaxed)
    }

    pub fn alerts_suppressed(&self) -> u64 {
        self.alerts_suppressed.load(Ordering::Relaxed)
    }

    pub fn sms_sent(&self) -> u64 {
        self.sms_sent.load(Ordering::Relaxed)
    }

    pub fn sms_failed(&self) -> u64 {
        self.sms_failed.load(Ordering::Relaxed)
    }

    /// Generate a summary report and reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self, classifier_armed: bool) -> MetricsSummary {
        let classified = self.classified_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);
        let alert_queue_delay_max_us = self.alert_queue_delay_max_us.swap(0, Ordering::Relaxed);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let samples_per_sec = if elapsed.as_secs_f64() > 0.0 {
            classified as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency = if classified > 0 { latency_sum / classified } else { 0 };

        MetricsSummary {
            accel_samples_total: self.accel_samples_total.load(Ordering::Relaxed),
            gyro_samples_total: self.gyro_samples_total.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped(),
            samples_per_sec,
            avg_classify_latency_us: avg_latency,
            max_classify_latency_us: max_latency,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            classifier_armed,
            falls_detected: self.falls_detected(),
            alert_cmds_dropped: self.alert_cmds_dropped(),
            alerts_dispatched: self.alerts_dispatched(),
            alerts_suppressed: self.alerts_suppressed(),
            sms_sent: self.sms_sent(),
            sms_failed: self.sms_failed(),
            alert_queue_delay_max_us,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub accel_samples_total: u64,
    pub gyro_samples_total: u64,
    pub samples_dropped: u64,
    pub samples_per_sec: f64,
    pub avg_classify_latency_us: u64,
    pub max_classify_latency_us: u64,
    /// Classification latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub classifier_armed: bool,
    pub falls_detected: u64,
    pub alert_cmds_dropped: u64,
    pub alerts_dispatched: u64,
    pub alerts_suppressed: u64,
    pub sms_sent: u64,
    pub sms_failed: u64,
    pub alert_queue_delay_max_us: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            accel_samples = %self.accel_samples_total,
            gyro_samples = %self.gyro_samples_total,
            samples_dropped = %self.samples_dropped,
            samples_per_sec = format!("{:.1}", self.samples_per_sec),
            avg_latency_us = %self.avg_classify_latency_us,
            max_latency_us = %self.max_classify_latency_us,
            p50_us = %self.lat_p50_us,
            p95_us = %self.lat_p95_us,
            p99_us = %self.lat_p99_us,
            armed = %self.classifier_armed,
            falls = %self.falls_detected,
            alerts = %self.alerts_dispatched,
            alerts_suppressed = %self.alerts_suppressed,
            alert_cmds_dropped = %self.alert_cmds_dropped,
            alert_queue_delay_max_us = %self.alert_queue_delay_max_us,
            sms_sent = %self.sms_sent,
            sms_failed = %self.sms_failed,
            "metrics"
        );
    }
}
