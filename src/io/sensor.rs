//! Motion sensor subscription
//!
//! A `SampleSource` yields raw samples (a replayed JSONL trace, or a fixed
//! list in tests). `SensorSubscription::register` spawns a delivery task that
//! filters to the registered sensor kinds, paces delivery at the requested
//! rate, and forwards samples with `try_send` so a slow consumer never
//! stalls the source. Dropping or releasing the subscription stops delivery
//! and closes the sample channel.

use crate::domain::types::{MotionSample, SensorKind};
use crate::infra::metrics::Metrics;
use anyhow::Context;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Requested delivery rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorDelay {
    /// As fast as the source produces
    Fastest,
    /// 20 ms between samples
    Game,
    /// 66 ms between samples
    Ui,
    /// 200 ms between samples
    #[default]
    Normal,
}

impl SensorDelay {
    /// Pause between deliveries; `None` for unpaced
    pub fn interval(&self) -> Option<Duration> {
        match self {
            SensorDelay::Fastest => None,
            SensorDelay::Game => Some(Duration::from_millis(20)),
            SensorDelay::Ui => Some(Duration::from_millis(66)),
            SensorDelay::Normal => Some(Duration::from_millis(200)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorDelay::Fastest => "fastest",
            SensorDelay::Game => "game",
            SensorDelay::Ui => "ui",
            SensorDelay::Normal => "normal",
        }
    }
}

/// Something that produces motion samples in order
pub trait SampleSource: Send + 'static {
    /// Next sample, or `None` when the source is exhausted
    fn next_sample(&mut self) -> anyhow::Result<Option<MotionSample>>;
}

/// Fixed list of samples
pub struct VecSource {
    samples: VecDeque<MotionSample>,
}

impl VecSource {
    pub fn new(samples: impl IntoIterator<Item = MotionSample>) -> Self {
        Self { samples: samples.into_iter().collect() }
    }
}

impl SampleSource for VecSource {
    fn next_sample(&mut self) -> anyhow::Result<Option<MotionSample>> {
        Ok(self.samples.pop_front())
    }
}

/// Replays a JSONL trace, one `MotionSample` per line
///
/// Blank lines and lines that fail to parse are skipped.
pub struct ReplaySource {
    path: PathBuf,
    reader: BufReader<File>,
    looping: bool,
    line_no: usize,
    parsed_any: bool,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>, looping: bool) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Failed to open sensor trace {}", path.display()))?;
        info!(path = %path.display(), looping = %looping, "replay_source_opened");
        Ok(Self { path, reader: BufReader::new(file), looping, line_no: 0, parsed_any: false })
    }

    fn rewind(&mut self) -> anyhow::Result<()> {
        self.reader
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("Failed to rewind {}", self.path.display()))?;
        self.line_no = 0;
        debug!(path = %self.path.display(), "replay_source_rewound");
        Ok(())
    }
}

impl SampleSource for ReplaySource {
    fn next_sample(&mut self) -> anyhow::Result<Option<MotionSample>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("Failed to read {}", self.path.display()))?;
            if read == 0 {
                // A trace with no valid samples would loop forever
                if self.looping && self.parsed_any {
                    self.rewind()?;
                    continue;
                }
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<MotionSample>(trimmed) {
                Ok(sample) => {
                    self.parsed_any = true;
                    return Ok(Some(sample));
                }
                Err(e) => {
                    warn!(line = %self.line_no, error = %e, "replay_line_invalid");
                }
            }
        }
    }
}

/// Live registration with a sample source
///
/// Delivery stops when this is released or dropped.
pub struct SensorSubscription {
    kinds: Vec<SensorKind>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SensorSubscription {
    /// Start delivering samples of `kinds` from `source`
    ///
    /// Must be called within a tokio runtime.
    pub fn register<S: SampleSource>(
        source: S,
        kinds: &[SensorKind],
        delay: SensorDelay,
        buffer_size: usize,
        metrics: Arc<Metrics>,
    ) -> (Self, mpsc::Receiver<MotionSample>) {
        let (sample_tx, sample_rx) = mpsc::channel(buffer_size.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let kinds = kinds.to_vec();

        info!(
            kinds = ?kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            delay = %delay.as_str(),
            "sensor_registered"
        );

        let task = tokio::spawn(deliver(
            source,
            kinds.clone(),
            delay,
            sample_tx,
            metrics,
            shutdown_rx,
        ));

        (Self { kinds, shutdown_tx, task: Some(task) }, sample_rx)
    }

    pub fn kinds(&self) -> &[SensorKind] {
        &self.kinds
    }

    /// Whether the delivery task is still running
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop delivery and wait for the delivery task to exit
    pub async fn release(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "sensor_task_failed");
            }
        }
        info!("sensor_released");
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown_tx.send(true);
            task.abort();
        }
    }
}

async fn deliver<S: SampleSource>(
    mut source: S,
    kinds: Vec<SensorKind>,
    delay: SensorDelay,
    sample_tx: mpsc::Sender<MotionSample>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = delay.interval().map(|period| {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker
    });

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);
    let mut delivered = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let sample = match source.next_sample() {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                info!(delivered = %delivered, "sensor_source_exhausted");
                break;
            }
            Err(e) => {
                error!(error = %e, "sensor_source_failed");
                break;
            }
        };
        if !kinds.contains(&sample.kind) {
            continue;
        }

        if let Some(ref mut ticker) = ticker {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
        } else {
            tokio::task::yield_now().await;
        }

        metrics.record_sample(sample.kind);
        match sample_tx.try_send(sample) {
            Ok(()) => delivered += 1,
            Err(TrySendError::Full(_)) => {
                metrics.record_sample_dropped();
                if last_drop_warn.elapsed() > Duration::from_secs(1) {
                    warn!("sensor_sample_dropped: channel full");
                    last_drop_warn = Instant::now();
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("sensor_channel_closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn accel(t: u64, m: f32) -> MotionSample {
        MotionSample::acceleration(t, m, 0.0, 0.0)
    }

    fn gyro(t: u64, m: f32) -> MotionSample {
        MotionSample::rotation(t, 0.0, 0.0, m)
    }

    #[test]
    fn test_delay_intervals() {
        assert_eq!(SensorDelay::Fastest.interval(), None);
        assert_eq!(SensorDelay::Game.interval(), Some(Duration::from_millis(20)));
        assert_eq!(SensorDelay::Ui.interval(), Some(Duration::from_millis(66)));
        assert_eq!(SensorDelay::Normal.interval(), Some(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_delivers_in_order_then_closes() {
        let metrics = Arc::new(Metrics::new());
        let source = VecSource::new(vec![accel(1, 9.8), accel(2, 25.0), accel(3, 0.2)]);
        let (_sub, mut rx) = SensorSubscription::register(
            source,
            &[SensorKind::Acceleration],
            SensorDelay::Fastest,
            16,
            metrics.clone(),
        );

        let mut received = Vec::new();
        while let Some(sample) = rx.recv().await {
            received.push(sample.timestamp_ms);
        }

        assert_eq!(received, vec![1, 2, 3]);
        assert_eq!(metrics.samples_total(), 3);
    }

    #[tokio::test]
    async fn test_filters_unregistered_kinds() {
        let metrics = Arc::new(Metrics::new());
        let source = VecSource::new(vec![accel(1, 9.8), gyro(2, 6.0), accel(3, 9.8)]);
        let (_sub, mut rx) = SensorSubscription::register(
            source,
            &[SensorKind::Acceleration],
            SensorDelay::Fastest,
            16,
            metrics,
        );

        let mut kinds = Vec::new();
        while let Some(sample) = rx.recv().await {
            kinds.push(sample.kind);
        }

        assert_eq!(kinds, vec![SensorKind::Acceleration, SensorKind::Acceleration]);
    }

    #[tokio::test]
    async fn test_full_channel_counts_drops() {
        let metrics = Arc::new(Metrics::new());
        let source = VecSource::new((0..10).map(|t| accel(t, 9.8)));
        let (sub, mut rx) = SensorSubscription::register(
            source,
            &[SensorKind::Acceleration],
            SensorDelay::Fastest,
            2,
            metrics.clone(),
        );

        // Do not consume until the source is exhausted
        while sub.is_active() {
            tokio::task::yield_now().await;
        }

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received + metrics.samples_dropped(), 10);
        assert!(metrics.samples_dropped() > 0);
    }

    #[tokio::test]
    async fn test_release_stops_delivery() {
        let metrics = Arc::new(Metrics::new());
        let source = VecSource::new((0..10_000).map(|t| accel(t, 9.8)));
        let (sub, mut rx) = SensorSubscription::register(
            source,
            &[SensorKind::Acceleration],
            SensorDelay::Game,
            16,
            metrics,
        );

        assert!(rx.recv().await.is_some());
        sub.release().await;

        // Channel drains what was queued, then closes
        let mut remaining = 0;
        while rx.recv().await.is_some() {
            remaining += 1;
        }
        assert!(remaining < 16);
    }

    #[tokio::test]
    async fn test_replay_source_skips_bad_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        fs::write(
            &path,
            concat!(
                r#"{"t":1,"kind":"accel","x":0.0,"y":0.0,"z":9.8}"#,
                "\n\nnot json\n",
                r#"{"t":2,"kind":"gyro","x":6.0,"y":0.0,"z":0.0}"#,
                "\n"
            ),
        )
        .unwrap();

        let mut source = ReplaySource::open(&path, false).unwrap();

        assert_eq!(source.next_sample().unwrap().unwrap().timestamp_ms, 1);
        let second = source.next_sample().unwrap().unwrap();
        assert_eq!(second.kind, SensorKind::AngularVelocity);
        assert!(source.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_replay_source_loops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        fs::write(&path, r#"{"t":7,"kind":"accel","x":0.0,"y":0.0,"z":9.8}"#).unwrap();

        let mut source = ReplaySource::open(&path, true).unwrap();
        for _ in 0..3 {
            assert_eq!(source.next_sample().unwrap().unwrap().timestamp_ms, 7);
        }
    }

    #[test]
    fn test_replay_loop_with_no_samples_ends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        fs::write(&path, "garbage\n").unwrap();

        let mut source = ReplaySource::open(&path, true).unwrap();
        assert!(source.next_sample().unwrap().is_none());
    }

    #[test]
    fn test_replay_missing_file() {
        let dir = tempdir().unwrap();
        assert!(ReplaySource::open(dir.path().join("nope.jsonl"), false).is_err());
    }
}
