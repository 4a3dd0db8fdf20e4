//! Outbound SMS transports
//!
//! - `OutboxSms` appends each message to a JSONL outbox file (one line per
//!   recipient) for a modem daemon or for inspection during development
//! - `HttpSmsGateway` posts each message to an HTTP SMS gateway
//!
//! Messages arrive already split into parts (see `domain::alert::split_sms`).

use crate::domain::contact::PhoneNumber;
use crate::domain::types::epoch_ms;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmsError {
    #[error("SMS permission denied")]
    PermissionDenied,
    #[error("Invalid phone number format: {0}")]
    InvalidNumber(String),
    #[error("Failed to send SMS: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    /// Whether the app may send SMS at all
    fn permission_granted(&self) -> bool;

    /// Send one (possibly multipart) message to a single recipient
    async fn send(&self, to: &PhoneNumber, parts: &[String]) -> Result<(), SmsError>;
}

/// Digits with an optional leading `+`
fn check_dialable(to: &PhoneNumber) -> Result<(), SmsError> {
    let digits = to.as_str().strip_prefix('+').unwrap_or(to.as_str());
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SmsError::InvalidNumber(to.to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct OutboxRecord<'a> {
    ts: u64,
    to: &'a str,
    parts: &'a [String],
}

/// Writes outgoing messages to a JSONL file
pub struct OutboxSms {
    file_path: PathBuf,
    permission_granted: bool,
}

impl OutboxSms {
    pub fn new(file_path: impl Into<PathBuf>, permission_granted: bool) -> Self {
        let file_path = file_path.into();
        info!(file_path = %file_path.display(), "sms_outbox_initialized");
        Self { file_path, permission_granted }
    }

    /// Append a line to the outbox file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path.display(), bytes = %line.len(), "sms_outbox_written");

        Ok(())
    }
}

#[async_trait]
impl SmsTransport for OutboxSms {
    fn permission_granted(&self) -> bool {
        self.permission_granted
    }

    async fn send(&self, to: &PhoneNumber, parts: &[String]) -> Result<(), SmsError> {
        if !self.permission_granted {
            return Err(SmsError::PermissionDenied);
        }
        check_dialable(to)?;

        let record = OutboxRecord { ts: epoch_ms(), to: to.as_str(), parts };
        let line =
            serde_json::to_string(&record).map_err(|e| SmsError::Transport(e.to_string()))?;
        self.append_line(&line).map_err(|e| {
            error!(to = %to, error = %e, "sms_outbox_write_failed");
            SmsError::Transport(e.to_string())
        })
    }
}

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    to: &'a str,
    parts: &'a [String],
}

/// Posts messages to an HTTP SMS gateway
pub struct HttpSmsGateway {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
    permission_granted: bool,
}

impl HttpSmsGateway {
    pub fn new(
        url: &str,
        token: Option<String>,
        timeout: Duration,
        permission_granted: bool,
    ) -> anyhow::Result<Self> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        info!(url = %url, "sms_gateway_initialized");
        Ok(Self { url: url.to_string(), token, client, permission_granted })
    }
}

#[async_trait]
impl SmsTransport for HttpSmsGateway {
    fn permission_granted(&self) -> bool {
        self.permission_granted
    }

    async fn send(&self, to: &PhoneNumber, parts: &[String]) -> Result<(), SmsError> {
        if !self.permission_granted {
            return Err(SmsError::PermissionDenied);
        }
        check_dialable(to)?;

        let mut request =
            self.client.post(&self.url).json(&GatewayRequest { to: to.as_str(), parts });
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| SmsError::Transport(e.to_string()))?;
        let status = response.status();
        match status.as_u16() {
            200..=299 => {
                debug!(to = %to, status = %status.as_u16(), "sms_gateway_accepted");
                Ok(())
            }
            401 | 403 => Err(SmsError::PermissionDenied),
            code => Err(SmsError::Transport(format!("gateway returned HTTP {code}"))),
        }
    }
}
