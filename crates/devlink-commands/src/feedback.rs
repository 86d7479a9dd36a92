//! Command outcome feedback.
//!
//! Outcomes are published on a broadcast bus for live subscribers and kept
//! in a bounded buffer of recent events. Publishing never fails the caller:
//! a bus without subscribers simply drops the broadcast.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use devlink_core::command::Command;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

const BROADCAST_CAPACITY: usize = 1000;

/// Outcome reported back to the command issuer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    /// Command accepted
    Received,
    /// Command refused
    Rejected,
    /// Command sent to the device
    InProgress,
    /// Device confirmed the command
    Successful,
    /// Device reported a failure
    Error,
    /// Superseded by a newer command
    Cancelled,
}

/// One outcome event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandFeedback {
    pub device_id: String,
    pub correlation_id: Uuid,
    pub status: FeedbackStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CommandFeedback {
    pub fn new(
        device_id: impl Into<String>,
        correlation_id: Uuid,
        status: FeedbackStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            correlation_id,
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Outcome of a stored command.
    pub fn for_command(command: &Command, status: FeedbackStatus, message: impl Into<String>) -> Self {
        Self::new(command.device_id.clone(), command.correlation_id, status, message)
    }
}

/// Event bus for command outcomes.
pub struct FeedbackBus {
    broadcast_tx: broadcast::Sender<CommandFeedback>,
    recent: Arc<RwLock<Vec<CommandFeedback>>>,
    max_stored: usize,
}

impl FeedbackBus {
    pub fn new(max_stored: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            broadcast_tx,
            recent: Arc::new(RwLock::new(Vec::new())),
            max_stored,
        }
    }

    /// Publish an outcome.
    pub async fn publish(&self, feedback: CommandFeedback) {
        debug!(
            category = "feedback",
            device_id = %feedback.device_id,
            correlation_id = %feedback.correlation_id,
            status = ?feedback.status,
            "Publishing command feedback"
        );

        let mut recent = self.recent.write().await;
        recent.push(feedback.clone());
        if recent.len() > self.max_stored {
            recent.remove(0);
        }
        drop(recent);

        let _ = self.broadcast_tx.send(feedback);
    }

    /// Publish an outcome of a stored command.
    pub async fn publish_for(&self, command: &Command, status: FeedbackStatus, message: impl Into<String>) {
        self.publish(CommandFeedback::for_command(command, status, message))
            .await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommandFeedback> {
        self.broadcast_tx.subscribe()
    }

    /// Most recent outcomes, oldest first.
    pub async fn get_recent(&self, limit: usize) -> Vec<CommandFeedback> {
        let recent = self.recent.read().await;
        let start = recent.len().saturating_sub(limit);
        recent[start..].to_vec()
    }

    /// Most recent outcomes of one device, newest first.
    pub async fn get_by_device(&self, device_id: &str, limit: usize) -> Vec<CommandFeedback> {
        let recent = self.recent.read().await;
        recent
            .iter()
            .filter(|f| f.device_id == device_id)
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Shared feedback bus handle.
pub type SharedFeedbackBus = Arc<FeedbackBus>;
