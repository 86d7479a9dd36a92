//! Storage layer for devlink.
//!
//! Commands and pre-shared keys are persisted in redb databases, one file
//! each, with in-memory equivalents for tests.

pub mod command_store;
pub mod error;
pub mod memory;
pub mod psk_store;

use std::path::Path;
use std::sync::Arc;

use devlink_core::config::StorageConfig;
use devlink_core::repository::{SharedCommandRepository, SharedPskRepository};
use tracing::info;

pub use command_store::RedbCommandStore;
pub use error::{Error, Result};
pub use memory::{MemoryCommandStore, MemoryPskStore};
pub use psk_store::RedbPskStore;

const COMMANDS_DB: &str = "commands.redb";
const PSK_DB: &str = "psk.redb";

/// The repositories a service instance works on.
#[derive(Clone)]
pub struct Stores {
    pub commands: SharedCommandRepository,
    pub keys: SharedPskRepository,
}

impl Stores {
    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            commands: Arc::new(MemoryCommandStore::new()),
            keys: Arc::new(MemoryPskStore::new()),
        }
    }

    /// Open the stores described by the storage configuration.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if config.data_dir == ":memory:" {
            info!(category = "storage", "Using in-memory stores");
            return Ok(Self::in_memory());
        }

        let dir = Path::new(&config.data_dir);
        info!(category = "storage", data_dir = %dir.display(), "Opening stores");
        Ok(Self {
            commands: RedbCommandStore::open(dir.join(COMMANDS_DB))?,
            keys: RedbPskStore::open(dir.join(PSK_DB))?,
        })
    }
}
