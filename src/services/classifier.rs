//! Impact-then-stillness fall classifier
//!
//! Two states:
//! - `Idle`: waiting for a hard impact (acceleration) or rapid rotation (gyro)
//! - `Armed`: an impact or rotation was seen, waiting for the device to go still
//!
//! An acceleration sample below the stillness threshold while armed emits a
//! single `FallEvent` and disarms. The classifier does no I/O; callers feed
//! samples in order and forward any event returned.

use crate::domain::types::{ArmTrigger, FallEvent, MotionSample, SensorKind};
use tracing::{debug, info};

/// Default impact threshold (m/s²)
pub const DEFAULT_IMPACT_THRESHOLD: f32 = 20.0;
/// Default rotation threshold (rad/s)
pub const DEFAULT_ROTATION_THRESHOLD: f32 = 5.0;
/// Default stillness threshold (m/s²)
pub const DEFAULT_STILL_THRESHOLD: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Acceleration magnitude that counts as an impact
    pub impact: f32,
    /// Angular velocity magnitude that counts as a rapid rotation
    pub rotation: f32,
    /// Acceleration magnitude below which the device is considered still
    pub still: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            impact: DEFAULT_IMPACT_THRESHOLD,
            rotation: DEFAULT_ROTATION_THRESHOLD,
            still: DEFAULT_STILL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifierState {
    Idle,
    Armed { since_ms: u64, trigger: ArmTrigger },
}

impl ClassifierState {
    pub fn is_armed(&self) -> bool {
        matches!(self, ClassifierState::Armed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierState::Idle => "idle",
            ClassifierState::Armed { .. } => "armed",
        }
    }
}

pub struct FallClassifier {
    thresholds: Thresholds,
    state: ClassifierState,
    last_acceleration: f32,
    last_rotation: f32,
}

impl FallClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds, state: ClassifierState::Idle, last_acceleration: 0.0, last_rotation: 0.0 }
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Magnitude of the most recent acceleration sample
    pub fn last_acceleration(&self) -> f32 {
        self.last_acceleration
    }

    /// Magnitude of the most recent angular velocity sample
    pub fn last_rotation(&self) -> f32 {
        self.last_rotation
    }

    pub fn reset(&mut self) {
        self.state = ClassifierState::Idle;
    }

    /// Feed one sample; returns a fall event when the pattern completes
    pub fn process(&mut self, sample: &MotionSample) -> Option<FallEvent> {
        let magnitude = sample.magnitude();

        let trigger = match sample.kind {
            SensorKind::Acceleration => {
                self.last_acceleration = magnitude;

                // Stillness only completes a pattern armed by an earlier sample
                if let ClassifierState::Armed { since_ms, trigger } = self.state {
                    if magnitude < self.thresholds.still {
                        self.state = ClassifierState::Idle;
                        let event = FallEvent::new(sample.timestamp_ms, trigger, magnitude);
                        info!(
                            event_id = %event.id,
                            trigger = %trigger.as_str(),
                            trigger_magnitude = %trigger.magnitude(),
                            still_magnitude = %magnitude,
                            armed_ms = %sample.timestamp_ms.saturating_sub(since_ms),
                            "fall_detected"
                        );
                        return Some(event);
                    }
                }

                (magnitude > self.thresholds.impact).then_some(ArmTrigger::Impact { magnitude })
            }
            SensorKind::AngularVelocity => {
                self.last_rotation = magnitude;
                (magnitude > self.thresholds.rotation)
                    .then_some(ArmTrigger::Rotation { magnitude })
            }
        };

        if let Some(trigger) = trigger {
            self.arm(sample.timestamp_ms, trigger);
        }
        None
    }

    fn arm(&mut self, at_ms: u64, trigger: ArmTrigger) {
        match self.state {
            ClassifierState::Idle => {
                debug!(
                    trigger = %trigger.as_str(),
                    magnitude = %trigger.magnitude(),
                    "classifier_armed"
                );
                self.state = ClassifierState::Armed { since_ms: at_ms, trigger };
            }
            ClassifierState::Armed { since_ms, trigger: current } => {
                // Keep the strongest trigger seen while armed
                if trigger.magnitude() > current.magnitude() {
                    self.state = ClassifierState::Armed { since_ms, trigger };
                }
            }
        }
    }
}

impl Default for FallClassifier {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
