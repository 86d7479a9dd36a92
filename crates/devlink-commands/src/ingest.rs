//! Backend ingestion: command requests and credential provisioning.
//!
//! Requests arrive on bounded channels and are processed by long-lived
//! listener tasks. Each request runs under the device's session guard so it
//! never interleaves with report handling of the same device. Failures are
//! logged; a listener only stops when its channel closes.

use chrono::{DateTime, Duration, Utc};
use devlink_core::command::{Command, CommandType};
use devlink_core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::decrypt::PskDecryptionService;
use crate::feedback::{CommandFeedback, FeedbackStatus, SharedFeedbackBus};
use crate::gate::SessionGate;
use crate::lifecycle::CommandService;
use crate::psk::PskService;

/// Command request from the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalCommand {
    pub correlation_id: Uuid,
    pub device_id: String,
    /// Command type name, e.g. `REBOOT`
    pub command: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Issue time; defaults to the moment of arrival
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ExternalCommand {
    /// Map the request to a PENDING command.
    pub fn to_command(&self) -> Result<Command> {
        let command_type = CommandType::from_name(&self.command)
            .ok_or_else(|| Error::Validation(format!("Command unknown: {}", self.command)))?;

        let mut command = Command::new(self.device_id.clone(), self.correlation_id, command_type)
            .with_value(self.value.clone());
        if let Some(timestamp) = self.timestamp {
            command = command.with_timestamp(timestamp);
        }
        Ok(command)
    }
}

/// Encrypted credentials provisioned for a device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceCredentials {
    pub device_id: String,
    /// Encrypted key material
    pub psk: String,
    /// Encrypted secret
    pub secret: String,
    /// Which decryption key to use
    pub key_ref: String,
}

/// Admits command requests.
#[derive(Clone)]
pub struct CommandConsumer {
    gate: SessionGate,
    commands: CommandService,
    feedback: SharedFeedbackBus,
}

impl CommandConsumer {
    pub fn new(gate: SessionGate, commands: CommandService, feedback: SharedFeedbackBus) -> Self {
        Self {
            gate,
            commands,
            feedback,
        }
    }

    /// Process one request. Validation failures are reported as REJECTED.
    pub async fn handle(&self, request: ExternalCommand) {
        info!(
            category = "ingest",
            device_id = %request.device_id,
            correlation_id = %request.correlation_id,
            command = %request.command,
            "Received command"
        );

        let _guard = self.gate.acquire(&request.device_id).await;
        let result = match request.to_command() {
            Ok(command) => self.commands.admit(command).await.map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_validation() => {
                let reason = e.to_string();
                warn!(
                    category = "ingest",
                    device_id = %request.device_id,
                    command = %request.command,
                    reason = %reason,
                    "Command rejected"
                );
                self.feedback
                    .publish(CommandFeedback::new(
                        request.device_id.clone(),
                        request.correlation_id,
                        FeedbackStatus::Rejected,
                        reason,
                    ))
                    .await;
            }
            Err(e) => {
                error!(
                    category = "ingest",
                    device_id = %request.device_id,
                    command = %request.command,
                    error = %e,
                    "Failed to admit command"
                );
            }
        }
    }
}

/// Stores provisioned credentials and schedules the first key rotation.
#[derive(Clone)]
pub struct CredentialsConsumer {
    gate: SessionGate,
    psk: PskService,
    commands: CommandService,
    decryption: PskDecryptionService,
    change_initial_psk: bool,
}

impl CredentialsConsumer {
    pub fn new(
        gate: SessionGate,
        psk: PskService,
        commands: CommandService,
        decryption: PskDecryptionService,
        change_initial_psk: bool,
    ) -> Self {
        Self {
            gate,
            psk,
            commands,
            decryption,
            change_initial_psk,
        }
    }

    /// Process one provisioning message. Failures are logged only.
    pub async fn handle(&self, credentials: DeviceCredentials) {
        info!(category = "ingest", device_id = %credentials.device_id, "Received credentials");

        let _guard = self.gate.acquire(&credentials.device_id).await;
        if let Err(e) = self.provision(&credentials).await {
            error!(
                category = "ingest",
                device_id = %credentials.device_id,
                error = %e,
                "Failed to set device credentials"
            );
        }
    }

    async fn provision(&self, credentials: &DeviceCredentials) -> Result<()> {
        let device_id = &credentials.device_id;
        let key = self
            .decryption
            .decrypt_secret(&credentials.psk, &credentials.key_ref)?;
        let secret = self
            .decryption
            .decrypt_secret(&credentials.secret, &credentials.key_ref)?;

        self.psk.set_initial_key(device_id, &key, &secret)?;
        self.psk.generate_ready_key(device_id)?;

        if self.change_initial_psk {
            let correlation_id = Uuid::new_v4();
            let rotate = Command::new(device_id.clone(), correlation_id, CommandType::KeyRotate);
            let commit = Command::new(device_id.clone(), correlation_id, CommandType::KeyRotateSet)
                .with_timestamp(rotate.timestamp_issued + Duration::milliseconds(1));
            self.commands.enqueue(&rotate).await?;
            self.commands.enqueue(&commit).await?;
            info!(category = "ingest", device_id = %device_id, "Initial key change scheduled");
        }
        Ok(())
    }
}

/// Start the listener task for command requests.
pub fn spawn_command_listener(
    consumer: CommandConsumer,
    mut rx: mpsc::Receiver<ExternalCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            consumer.handle(request).await;
        }
        info!(category = "ingest", "Command listener stopped");
    })
}

/// Start the listener task for credential provisioning.
pub fn spawn_credentials_listener(
    consumer: CredentialsConsumer,
    mut rx: mpsc::Receiver<DeviceCredentials>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(credentials) = rx.recv().await {
            consumer.handle(credentials).await;
        }
        info!(category = "ingest", "Credentials listener stopped");
    })
}
