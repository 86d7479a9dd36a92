//! Storage contracts for commands and pre-shared keys.
//!
//! Every method is a single-record read or write; callers treat each write as
//! the unit of atomicity. A missing record is `Ok(None)`.

use std::sync::Arc;

use crate::command::{Command, CommandId, CommandStatus};
use crate::error::Result;
use crate::psk::{PreSharedKey, PskStatus};

/// Durable record of commands issued to devices.
pub trait CommandRepository: Send + Sync {
    /// Insert or replace a command.
    fn save(&self, command: &Command) -> Result<()>;

    /// Load a command of a device.
    fn get(&self, device_id: &str, id: &CommandId) -> Result<Option<Command>>;

    /// All commands of a device, oldest issue time first.
    fn list_for_device(&self, device_id: &str) -> Result<Vec<Command>>;

    /// Commands of a device in the given status, oldest issue time first.
    fn list_for_device_with_status(
        &self,
        device_id: &str,
        status: CommandStatus,
    ) -> Result<Vec<Command>> {
        Ok(self
            .list_for_device(device_id)?
            .into_iter()
            .filter(|c| c.status == status)
            .collect())
    }
}

/// Durable, versioned record of pre-shared keys.
pub trait PskRepository: Send + Sync {
    /// Insert or replace a key revision.
    fn save(&self, key: &PreSharedKey) -> Result<()>;

    /// All revisions of an identity, lowest revision first.
    fn list_for_identity(&self, identity: &str) -> Result<Vec<PreSharedKey>>;

    /// Highest revision in the given status.
    fn latest_with_status(&self, identity: &str, status: PskStatus) -> Result<Option<PreSharedKey>> {
        Ok(self
            .list_for_identity(identity)?
            .into_iter()
            .filter(|k| k.status == status)
            .max_by_key(|k| k.revision))
    }

    /// Highest revision stored for the identity.
    fn latest_revision(&self, identity: &str) -> Result<Option<u32>> {
        Ok(self
            .list_for_identity(identity)?
            .iter()
            .map(|k| k.revision)
            .max())
    }
}

/// Shared command repository handle.
pub type SharedCommandRepository = Arc<dyn CommandRepository>;

/// Shared key repository handle.
pub type SharedPskRepository = Arc<dyn PskRepository>;
