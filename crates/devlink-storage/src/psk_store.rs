//! Pre-shared key storage using redb.

use std::path::Path;
use std::sync::Arc;

use devlink_core::psk::PreSharedKey;
use devlink_core::repository::PskRepository;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::Result;

// Keys table: key = (identity, revision), value = PreSharedKey (JSON)
const PSK_TABLE: TableDefinition<(&str, u32), &str> = TableDefinition::new("pre_shared_keys");

/// Persistent, versioned key store.
pub struct RedbPskStore {
    db: Arc<Database>,
}

impl RedbPskStore {
    /// Open or create a key store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _keys = write_txn.open_table(PSK_TABLE)?;
        }
        write_txn.commit()?;

        debug!(category = "storage", path = %path.display(), "Opened key store");
        Ok(Arc::new(Self { db: Arc::new(db) }))
    }

    /// Insert or replace a key revision.
    pub fn save_key(&self, key: &PreSharedKey) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PSK_TABLE)?;
            let json = serde_json::to_string(key)?;
            table.insert((key.identity.as_str(), key.revision), json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// List all revisions of an identity, lowest first.
    pub fn list_keys(&self, identity: &str) -> Result<Vec<PreSharedKey>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PSK_TABLE)?;

        let mut keys = Vec::new();
        for result in table.range((identity, 0)..=(identity, u32::MAX))? {
            let (_key, value) = result?;
            let key: PreSharedKey = serde_json::from_str(value.value())?;
            keys.push(key);
        }
        Ok(keys)
    }
}

impl PskRepository for RedbPskStore {
    fn save(&self, key: &PreSharedKey) -> devlink_core::Result<()> {
        Ok(self.save_key(key)?)
    }

    fn list_for_identity(&self, identity: &str) -> devlink_core::Result<Vec<PreSharedKey>> {
        Ok(self.list_keys(identity)?)
    }
}
