//! Pre-shared key records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PskStatus {
    /// Generated, not yet sent to the device
    Ready,
    /// Sent to the device, awaiting confirmation
    Pending,
    /// In use by the device
    Active,
    /// Replaced by a newer active key
    Inactive,
    /// Rejected by the device or discarded before use
    Invalid,
}

/// A versioned pre-shared key for one device identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreSharedKey {
    pub identity: String,
    pub revision: u32,
    pub timestamp: DateTime<Utc>,
    /// Key material
    pub key: String,
    pub secret: String,
    pub status: PskStatus,
}

impl PreSharedKey {
    pub fn new(
        identity: impl Into<String>,
        revision: u32,
        key: impl Into<String>,
        secret: impl Into<String>,
        status: PskStatus,
    ) -> Self {
        Self {
            identity: identity.into(),
            revision,
            timestamp: Utc::now(),
            key: key.into(),
            secret: secret.into(),
            status,
        }
    }

    /// Copy of this key with a new status.
    pub fn with_status(mut self, status: PskStatus) -> Self {
        self.status = status;
        self
    }
}

impl std::fmt::Display for PskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PskStatus::Ready => "READY",
            PskStatus::Pending => "PENDING",
            PskStatus::Active => "ACTIVE",
            PskStatus::Inactive => "INACTIVE",
            PskStatus::Invalid => "INVALID",
        };
        f.write_str(name)
    }
}
