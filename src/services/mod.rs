//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `classifier` - Impact-then-stillness fall state machine
//! - `fall_monitor` - Sample loop driving the classifier
//! - `alert_worker` - Sends fall alerts to emergency contacts off the hot path
//! - `contacts` - Persistent emergency contact book
//! - `face_store` - Name-tagged saved faces

pub mod alert_worker;
pub mod classifier;
pub mod contacts;
pub mod face_store;
pub mod fall_monitor;

// Re-export commonly used types
pub use alert_worker::{create_alert_worker, AlertCmd, AlertDispatcher, AlertWorker, DispatchOutcome};
pub use classifier::{ClassifierState, FallClassifier, Thresholds};
pub use contacts::ContactBook;
pub use face_store::FaceStore;
pub use fall_monitor::FallMonitor;
