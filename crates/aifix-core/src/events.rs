//! Push-style progress notifications.
//!
//! Sinks are fire-and-forget: `emit` never blocks, never fails and the run
//! never reads anything back from a sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Status tag of a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Info,
    Cloning,
    Analyzing,
    Installing,
    Testing,
    Heartbeat,
    Fixing,
    Success,
    Warning,
    Pushing,
    Completed,
    Error,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Info => "info",
            ProgressStatus::Cloning => "cloning",
            ProgressStatus::Analyzing => "analyzing",
            ProgressStatus::Installing => "installing",
            ProgressStatus::Testing => "testing",
            ProgressStatus::Heartbeat => "heartbeat",
            ProgressStatus::Fixing => "fixing",
            ProgressStatus::Success => "success",
            ProgressStatus::Warning => "warning",
            ProgressStatus::Pushing => "pushing",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Error => "error",
        }
    }
}

/// One progress notification: a status tag, a human message and an optional
/// structured payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Receiver of progress notifications.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event.status {
            ProgressStatus::Error => {
                tracing::error!(status = event.status.as_str(), "{}", event.message)
            }
            ProgressStatus::Warning => {
                tracing::warn!(status = event.status.as_str(), "{}", event.message)
            }
            _ => tracing::info!(status = event.status.as_str(), "{}", event.message),
        }
    }
}

/// Forwards events into a bounded channel; drops them when the channel is
/// full or closed.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::trace!(error = %e, "progress event dropped");
        }
    }
}
