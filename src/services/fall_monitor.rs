//! Sample loop - feeds the classifier and hands fall events to the alert worker
//!
//! Samples are processed serially; the classifier is owned by this loop and
//! nothing else mutates it. Alerts are enqueued with `try_send` so a slow SMS
//! path never holds up classification.

use crate::domain::types::{FallEvent, MotionSample};
use crate::infra::metrics::Metrics;
use crate::services::alert_worker::AlertCmd;
use crate::services::classifier::{ClassifierState, FallClassifier};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, warn};

pub struct FallMonitor {
    classifier: FallClassifier,
    alert_tx: mpsc::Sender<AlertCmd>,
    metrics: Arc<Metrics>,
    /// Last published classifier state, read by the metrics reporter
    state: Arc<Mutex<ClassifierState>>,
}

impl FallMonitor {
    pub fn new(
        classifier: FallClassifier,
        alert_tx: mpsc::Sender<AlertCmd>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let state = Arc::new(Mutex::new(classifier.state()));
        Self { classifier, alert_tx, metrics, state }
    }

    /// Shared view of the classifier state
    pub fn state_handle(&self) -> Arc<Mutex<ClassifierState>> {
        self.state.clone()
    }

    pub fn classifier(&self) -> &FallClassifier {
        &self.classifier
    }

    /// Process samples until the channel closes
    pub async fn run(mut self, mut sample_rx: mpsc::Receiver<MotionSample>) -> FallClassifier {
        info!(thresholds = ?self.classifier.thresholds(), "fall_monitor_started");

        while let Some(sample) = sample_rx.recv().await {
            self.process_sample(&sample);
        }

        info!(falls = %self.metrics.falls_detected(), "fall_monitor_stopped");
        self.classifier
    }

    /// Classify one sample, enqueueing an alert if it completes a fall
    pub fn process_sample(&mut self, sample: &MotionSample) -> Option<FallEvent> {
        let start = Instant::now();
        let event = self.classifier.process(sample);
        self.metrics.record_classified(start.elapsed().as_micros() as u64);
        *self.state.lock() = self.classifier.state();

        let event = event?;
        self.metrics.record_fall_detected();

        let cmd = AlertCmd { event: event.clone(), enqueued_at: Instant::now() };
        match self.alert_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                self.metrics.record_alert_cmd_dropped();
                warn!(event_id = %cmd.event.id, "alert_cmd_dropped: channel full");
            }
            Err(TrySendError::Closed(cmd)) => {
                error!(event_id = %cmd.event.id, "alert_channel_closed");
            }
        }
        Some(event)
    }
}
