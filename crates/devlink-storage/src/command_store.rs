//! Command storage using redb.

use std::path::Path;
use std::sync::Arc;

use devlink_core::command::{Command, CommandId};
use devlink_core::repository::CommandRepository;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::Result;

// Commands table: key = (device_id, command_id), value = Command (JSON)
const COMMANDS_TABLE: TableDefinition<(&str, &str), &str> = TableDefinition::new("commands");

/// Persistent command store.
pub struct RedbCommandStore {
    db: Arc<Database>,
}

impl RedbCommandStore {
    /// Open or create a command store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _commands = write_txn.open_table(COMMANDS_TABLE)?;
        }
        write_txn.commit()?;

        debug!(category = "storage", path = %path.display(), "Opened command store");
        Ok(Arc::new(Self { db: Arc::new(db) }))
    }

    /// Insert or replace a command.
    pub fn save_command(&self, command: &Command) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(COMMANDS_TABLE)?;
            let json = serde_json::to_string(command)?;
            let id = command.id.to_string();
            table.insert((command.device_id.as_str(), id.as_str()), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load a command of a device.
    pub fn load_command(&self, device_id: &str, id: &CommandId) -> Result<Option<Command>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMANDS_TABLE)?;
        let id = id.to_string();

        match table.get((device_id, id.as_str()))? {
            Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
            None => Ok(None),
        }
    }

    /// List the commands of a device, oldest first.
    pub fn list_commands(&self, device_id: &str) -> Result<Vec<Command>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COMMANDS_TABLE)?;

        let mut commands = Vec::new();
        let start_key = (device_id, "");
        let end_key = (device_id, "\x7F");

        for result in table.range(start_key..=end_key)? {
            let (_key, value) = result?;
            let command: Command = serde_json::from_str(value.value())?;
            commands.push(command);
        }

        commands.sort_by(|a, b| a.timestamp_issued.cmp(&b.timestamp_issued));
        Ok(commands)
    }
}

impl CommandRepository for RedbCommandStore {
    fn save(&self, command: &Command) -> devlink_core::Result<()> {
        Ok(self.save_command(command)?)
    }

    fn get(&self, device_id: &str, id: &CommandId) -> devlink_core::Result<Option<Command>> {
        Ok(self.load_command(device_id, id)?)
    }

    fn list_for_device(&self, device_id: &str) -> devlink_core::Result<Vec<Command>> {
        Ok(self.list_commands(device_id)?)
    }
}
