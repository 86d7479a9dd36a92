//! Device session protocol engine.
//!
//! Provides:
//! - Pre-shared key rotation state machine
//! - Command admission, cancellation and status bookkeeping
//! - Interpretation of device result codes
//! - Downlink composition within a byte budget
//! - Per-device session gate
//! - Command outcome feedback
//! - Backend ingestion of commands and credentials

pub mod decrypt;
pub mod downlink;
pub mod feedback;
pub mod gate;
pub mod ingest;
pub mod lifecycle;
pub mod psk;
pub mod session;
pub mod urc;

use std::sync::Arc;

use devlink_core::config::AppConfig;
use devlink_core::error::Result;
use devlink_core::repository::{SharedCommandRepository, SharedPskRepository};

pub use decrypt::PskDecryptionService;
pub use downlink::DownlinkComposer;
pub use feedback::{CommandFeedback, FeedbackBus, FeedbackStatus, SharedFeedbackBus};
pub use gate::{SessionGate, SessionGuard};
pub use ingest::{
    CommandConsumer, CredentialsConsumer, DeviceCredentials, ExternalCommand,
    spawn_command_listener, spawn_credentials_listener,
};
pub use lifecycle::CommandService;
pub use psk::{PskService, psk_token};
pub use session::DeviceSessionService;
pub use urc::UrcInterpreter;

/// All engine services wired to one set of stores.
#[derive(Clone)]
pub struct Engine {
    pub gate: SessionGate,
    pub feedback: SharedFeedbackBus,
    pub psk: PskService,
    pub commands: CommandService,
    pub sessions: DeviceSessionService,
    pub command_consumer: CommandConsumer,
    pub credentials_consumer: CredentialsConsumer,
}

impl Engine {
    pub fn new(
        config: &AppConfig,
        commands: SharedCommandRepository,
        keys: SharedPskRepository,
    ) -> Result<Self> {
        let decryption = PskDecryptionService::from_config(&config.psk.decryption)?;
        let gate = SessionGate::new();
        let feedback = Arc::new(FeedbackBus::new(config.server.feedback_history));
        let psk = PskService::new(keys);
        let command_service = CommandService::new(commands, psk.clone(), feedback.clone());

        let interpreter = UrcInterpreter::new(psk.clone(), command_service.clone(), feedback.clone());
        let composer = DownlinkComposer::new(
            psk.clone(),
            command_service.clone(),
            feedback.clone(),
            config.message.max_bytes,
        );

        Ok(Self {
            sessions: DeviceSessionService::new(gate.clone(), interpreter, composer),
            command_consumer: CommandConsumer::new(
                gate.clone(),
                command_service.clone(),
                feedback.clone(),
            ),
            credentials_consumer: CredentialsConsumer::new(
                gate.clone(),
                psk.clone(),
                command_service.clone(),
                decryption,
                config.psk.change_initial_psk,
            ),
            gate,
            feedback,
            psk,
            commands: command_service,
        })
    }
}
