//! User-visible notices
//!
//! Short, transient messages shown to the user (toast-style): missing
//! contacts, missing SMS permission, per-contact send results, and the
//! vibration that follows an alert. Notices go through a bounded channel
//! and are never allowed to block the alert path.

use crate::domain::contact::PhoneNumber;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Vibration length after an alert has been sent out
pub const ALERT_VIBRATION_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum UserNotice {
    NoContacts,
    SmsPermissionDenied,
    SmsSent { contact: PhoneNumber },
    SmsFailed { contact: PhoneNumber, reason: String },
    AlertVibration { duration_ms: u64 },
}

impl UserNotice {
    /// Text shown to the user
    pub fn text(&self) -> String {
        match self {
            UserNotice::NoContacts => {
                "No emergency contact set. Please add one in settings.".to_string()
            }
            UserNotice::SmsPermissionDenied => {
                "SMS permission not granted. Cannot send emergency messages.".to_string()
            }
            UserNotice::SmsSent { contact } => format!("SMS sent to {contact}"),
            UserNotice::SmsFailed { reason, .. } => reason.clone(),
            UserNotice::AlertVibration { duration_ms } => format!("Vibrating for {duration_ms} ms"),
        }
    }

    /// Warnings stay on screen longer
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            UserNotice::NoContacts | UserNotice::SmsPermissionDenied | UserNotice::SmsFailed { .. }
        )
    }
}

/// Sender handle for notices
///
/// Clone this to share across producers.
/// Non-blocking - if the channel is full, notices are dropped.
#[derive(Clone)]
pub struct NoticeSender {
    tx: mpsc::Sender<UserNotice>,
}

impl NoticeSender {
    pub fn new(tx: mpsc::Sender<UserNotice>) -> Self {
        Self { tx }
    }

    pub fn notify(&self, notice: UserNotice) {
        if self.tx.try_send(notice).is_err() {
            warn!("notice_dropped");
        }
    }
}

/// Create a new notice channel pair
pub fn create_notice_channel(buffer_size: usize) -> (NoticeSender, mpsc::Receiver<UserNotice>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (NoticeSender::new(tx), rx)
}

/// Surface notices through the log until all senders are dropped
pub async fn run_notice_logger(mut rx: mpsc::Receiver<UserNotice>) {
    while let Some(notice) = rx.recv().await {
        let text = notice.text();
        if notice.is_warning() {
            warn!(notice = %text, "user_notice");
        } else {
            info!(notice = %text, "user_notice");
        }
    }
}
