//! In-memory stores.
//!
//! Non-persistent counterparts of the redb stores, for tests and for
//! running with `data_dir = ":memory:"`.

use dashmap::DashMap;
use devlink_core::command::{Command, CommandId};
use devlink_core::psk::PreSharedKey;
use devlink_core::repository::{CommandRepository, PskRepository};
use devlink_core::Result;

/// In-memory command store.
#[derive(Default)]
pub struct MemoryCommandStore {
    commands: DashMap<(String, CommandId), Command>,
}

impl MemoryCommandStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRepository for MemoryCommandStore {
    fn save(&self, command: &Command) -> Result<()> {
        self.commands
            .insert((command.device_id.clone(), command.id), command.clone());
        Ok(())
    }

    fn get(&self, device_id: &str, id: &CommandId) -> Result<Option<Command>> {
        Ok(self
            .commands
            .get(&(device_id.to_string(), *id))
            .map(|c| c.value().clone()))
    }

    fn list_for_device(&self, device_id: &str) -> Result<Vec<Command>> {
        let mut commands: Vec<Command> = self
            .commands
            .iter()
            .filter(|entry| entry.key().0 == device_id)
            .map(|entry| entry.value().clone())
            .collect();
        commands.sort_by(|a, b| a.timestamp_issued.cmp(&b.timestamp_issued));
        Ok(commands)
    }
}

/// In-memory key store.
#[derive(Default)]
pub struct MemoryPskStore {
    keys: DashMap<(String, u32), PreSharedKey>,
}

impl MemoryPskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PskRepository for MemoryPskStore {
    fn save(&self, key: &PreSharedKey) -> Result<()> {
        self.keys
            .insert((key.identity.clone(), key.revision), key.clone());
        Ok(())
    }

    fn list_for_identity(&self, identity: &str) -> Result<Vec<PreSharedKey>> {
        let mut keys: Vec<PreSharedKey> = self
            .keys
            .iter()
            .filter(|entry| entry.key().0 == identity)
            .map(|entry| entry.value().clone())
            .collect();
        keys.sort_by_key(|k| k.revision);
        Ok(keys)
    }
}
