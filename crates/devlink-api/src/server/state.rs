//! Shared server state.

use std::sync::Arc;

use devlink_commands::{
    DeviceCredentials, Engine, ExternalCommand, spawn_command_listener, spawn_credentials_listener,
};
use devlink_core::config::AppConfig;
use devlink_storage::Stores;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// State handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub engine: Engine,
    /// Inbound command requests, drained by the command listener
    pub command_tx: mpsc::Sender<ExternalCommand>,
    /// Inbound credentials, drained by the credentials listener
    pub credentials_tx: mpsc::Sender<DeviceCredentials>,
    pub started_at: i64,
    listeners: Arc<Vec<JoinHandle<()>>>,
}

impl ServerState {
    /// Wire the engine to the stores and start the ingestion listeners.
    pub fn start(config: &AppConfig, stores: Stores) -> anyhow::Result<Self> {
        let engine = Engine::new(config, stores.commands, stores.keys)?;

        let capacity = config.server.ingest_capacity.max(1);
        let (command_tx, command_rx) = mpsc::channel(capacity);
        let (credentials_tx, credentials_rx) = mpsc::channel(capacity);

        let listeners = vec![
            spawn_command_listener(engine.command_consumer.clone(), command_rx),
            spawn_credentials_listener(engine.credentials_consumer.clone(), credentials_rx),
        ];

        Ok(Self {
            engine,
            command_tx,
            credentials_tx,
            started_at: chrono::Utc::now().timestamp(),
            listeners: Arc::new(listeners),
        })
    }

    /// Whether both ingestion listeners are still running.
    pub fn listeners_running(&self) -> bool {
        self.listeners.iter().all(|handle| !handle.is_finished())
    }
}
