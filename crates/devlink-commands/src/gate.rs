//! Per-device mutual exclusion.
//!
//! Every piece of work that reads or changes the state of one device runs
//! while holding that device's guard. Lock entries are created on demand and
//! removed when the last holder or waiter lets go, so the registry only holds
//! devices that are busy right now.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Registry of per-device locks.
#[derive(Clone, Default)]
pub struct SessionGate {
    locks: Arc<LockMap>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the device is free and take it.
    pub async fn acquire(&self, device_id: &str) -> SessionGuard {
        let lock = self
            .locks
            .entry(device_id.to_string())
            .or_default()
            .value()
            .clone();
        let guard = lock.lock_owned().await;
        trace!(category = "gate", device_id = %device_id, "Session acquired");

        SessionGuard {
            device_id: device_id.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Number of devices currently held or waited for.
    pub fn active_sessions(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one device, released on drop.
pub struct SessionGuard {
    device_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl SessionGuard {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own reference, so the entry survives while anyone queues on it.
        self.locks
            .remove_if(&self.device_id, |_, lock| Arc::strong_count(lock) == 1);
        trace!(category = "gate", device_id = %self.device_id, "Session released");
    }
}
