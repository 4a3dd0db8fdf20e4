//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `sensor` - Motion sample sources and scoped sensor subscriptions
//! - `location` - Last-known location provider chain
//! - `sms` - Outbound SMS transports (JSONL outbox, HTTP gateway)
//! - `notices` - User-visible notices channel
//! - `preferences` - Key-value preference storage

pub mod location;
pub mod notices;
pub mod preferences;
pub mod sensor;
pub mod sms;

// Re-export commonly used types
pub use location::{FixFileProvider, LastKnownLocation, LocationProvider, StaticProvider};
pub use notices::{create_notice_channel, NoticeSender, UserNotice};
pub use preferences::{JsonFilePreferences, MemoryPreferences, PreferenceStore};
pub use sensor::{ReplaySource, SampleSource, SensorDelay, SensorSubscription, VecSource};
pub use sms::{HttpSmsGateway, OutboxSms, SmsError, SmsTransport};
