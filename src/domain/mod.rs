//! Domain models - motion samples, contacts, alert text and face images
//!
//! This module contains the canonical data types used throughout the system:
//! - `MotionSample` - a 3-axis accelerometer or gyroscope reading
//! - `FallEvent` - impact followed by stillness, handed to the dispatcher
//! - `PhoneNumber` / `ContactList` - normalized emergency contacts
//! - `FaceImage` - cropped face used by the face tag store
//! - `compose_alert_message` / `split_sms` - outbound message text

pub mod alert;
pub mod contact;
pub mod face;
pub mod types;

// Re-export commonly used types at module level
pub use contact::{ContactError, ContactList, DialingPlan, PhoneNumber};
pub use face::{FaceBox, FaceImage, FaceImageError};
pub use types::{ArmTrigger, FallEvent, GeoLocation, LocationSource, MotionSample, SensorKind};
