//! Shared types for motion sensing and fall alerts

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Kind of inertial sensor that produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// Linear acceleration in m/s²
    #[serde(rename = "accel")]
    Acceleration,
    /// Angular velocity in rad/s
    #[serde(rename = "gyro")]
    AngularVelocity,
}

impl SensorKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Acceleration => "accel",
            SensorKind::AngularVelocity => "gyro",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single 3-axis reading delivered by the sensor source
///
/// Samples are consumed immediately by the classifier and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Sensor timestamp (epoch ms)
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
    pub kind: SensorKind,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl MotionSample {
    pub fn new(timestamp_ms: u64, kind: SensorKind, x: f32, y: f32, z: f32) -> Self {
        Self { timestamp_ms, kind, x, y, z }
    }

    pub fn acceleration(timestamp_ms: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(timestamp_ms, SensorKind::Acceleration, x, y, z)
    }

    pub fn rotation(timestamp_ms: u64, x: f32, y: f32, z: f32) -> Self {
        Self::new(timestamp_ms, SensorKind::AngularVelocity, x, y, z)
    }

    /// Euclidean norm of the axis triplet
    #[inline]
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// What moved the classifier into the armed state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArmTrigger {
    /// Acceleration magnitude above the impact threshold
    Impact { magnitude: f32 },
    /// Angular velocity magnitude above the rotation threshold
    Rotation { magnitude: f32 },
}

impl ArmTrigger {
    pub fn magnitude(&self) -> f32 {
        match *self {
            ArmTrigger::Impact { magnitude } | ArmTrigger::Rotation { magnitude } => magnitude,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArmTrigger::Impact { .. } => "impact",
            ArmTrigger::Rotation { .. } => "rotation",
        }
    }
}

/// Impact (or rapid rotation) followed by stillness
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallEvent {
    /// UUIDv7, time-sortable
    pub id: String,
    /// Timestamp of the stillness sample that completed the pattern
    pub detected_at_ms: u64,
    /// Strongest trigger observed while armed
    pub trigger: ArmTrigger,
    /// Acceleration magnitude of the stillness sample
    pub still_magnitude: f32,
}

impl FallEvent {
    pub fn new(detected_at_ms: u64, trigger: ArmTrigger, still_magnitude: f32) -> Self {
        Self { id: Uuid::now_v7().to_string(), detected_at_ms, trigger, still_magnitude }
    }
}

/// Provider kind a location fix came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Gps,
    Network,
    Static,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::Gps => "gps",
            LocationSource::Network => "network",
            LocationSource::Static => "static",
        }
    }
}

/// Last known position of the device
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub source: LocationSource,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64, source: LocationSource) -> Self {
        Self { latitude, longitude, source }
    }
}
