//! Command admission and status bookkeeping.

use devlink_core::command::{Command, CommandStatus};
use devlink_core::error::{Error, Result};
use devlink_core::repository::SharedCommandRepository;
use tracing::{debug, info};

use crate::feedback::{FeedbackStatus, SharedFeedbackBus};
use crate::psk::PskService;

/// Rejection reason when a newer command of the same type is active.
pub const REASON_NEWER_COMMAND: &str = "There is a newer command of the same type";

/// Rejection reason when a key rotation is requested without an active key.
pub const REASON_NO_ACTIVE_KEY: &str = "Device has no active key";

/// Manages the command lifecycle from admission to terminal status.
#[derive(Clone)]
pub struct CommandService {
    commands: SharedCommandRepository,
    psk: PskService,
    feedback: SharedFeedbackBus,
}

impl CommandService {
    pub fn new(commands: SharedCommandRepository, psk: PskService, feedback: SharedFeedbackBus) -> Self {
        Self {
            commands,
            psk,
            feedback,
        }
    }

    /// Check that a command may be admitted.
    pub fn validate(&self, command: &Command) -> Result<()> {
        let newer_exists = self
            .active_of_same_type(command)?
            .iter()
            .any(|existing| existing.timestamp_issued > command.timestamp_issued);
        if newer_exists {
            return Err(Error::Validation(REASON_NEWER_COMMAND.to_string()));
        }

        if command.command_type.is_key_rotation()
            && self.psk.current_active_key(&command.device_id)?.is_none()
        {
            return Err(Error::Validation(REASON_NO_ACTIVE_KEY.to_string()));
        }

        Ok(())
    }

    /// Validate and store a new command.
    ///
    /// Older active commands of the same type are cancelled, and a fresh
    /// READY key is generated for key-rotation types.
    pub async fn admit(&self, command: Command) -> Result<Command> {
        self.validate(&command)?;
        self.feedback
            .publish_for(&command, FeedbackStatus::Received, "Command received")
            .await;

        self.cancel_older_commands(&command).await?;

        if command.command_type.is_key_rotation() {
            self.psk.generate_ready_key(&command.device_id)?;
        }

        let pending = command.with_status(CommandStatus::Pending);
        self.commands.save(&pending)?;
        info!(
            category = "commands",
            device_id = %pending.device_id,
            command_id = %pending.id,
            command_type = %pending.command_type,
            "Command admitted"
        );
        Ok(pending)
    }

    /// Cancel active commands of the same type issued no later than `command`.
    pub async fn cancel_older_commands(&self, command: &Command) -> Result<Vec<Command>> {
        let mut cancelled = Vec::new();
        for older in self
            .active_of_same_type(command)?
            .into_iter()
            .filter(|c| c.id != command.id && c.timestamp_issued <= command.timestamp_issued)
        {
            let older = older.with_status(CommandStatus::Cancelled);
            self.commands.save(&older)?;
            info!(
                category = "commands",
                device_id = %older.device_id,
                command_id = %older.id,
                command_type = %older.command_type,
                "Cancelled older command"
            );
            self.feedback
                .publish_for(
                    &older,
                    FeedbackStatus::Cancelled,
                    "Command cancelled by newer command of the same type",
                )
                .await;
            cancelled.push(older);
        }
        Ok(cancelled)
    }

    /// Store a command without validation.
    ///
    /// Older active commands of the same type are cancelled first, as on
    /// admission.
    pub async fn enqueue(&self, command: &Command) -> Result<()> {
        self.cancel_older_commands(command).await?;
        debug!(
            category = "commands",
            device_id = %command.device_id,
            command_type = %command.command_type,
            "Enqueueing command"
        );
        self.commands.save(command)
    }

    /// PENDING commands of a device, oldest first.
    pub fn pending_commands(&self, device_id: &str) -> Result<Vec<Command>> {
        self.commands
            .list_for_device_with_status(device_id, CommandStatus::Pending)
    }

    /// Oldest IN_PROGRESS command of a device.
    pub fn first_in_progress(&self, device_id: &str) -> Result<Option<Command>> {
        Ok(self
            .commands
            .list_for_device_with_status(device_id, CommandStatus::InProgress)?
            .into_iter()
            .next())
    }

    /// IN_PROGRESS commands of the key-rotation family.
    pub fn key_rotations_in_progress(&self, device_id: &str) -> Result<Vec<Command>> {
        Ok(self
            .commands
            .list_for_device_with_status(device_id, CommandStatus::InProgress)?
            .into_iter()
            .filter(|c| c.command_type.is_key_rotation())
            .collect())
    }

    /// Persist a command with a new status.
    pub fn save_with_status(&self, command: Command, status: CommandStatus) -> Result<Command> {
        let updated = command.with_status(status);
        self.commands.save(&updated)?;
        debug!(
            category = "commands",
            device_id = %updated.device_id,
            command_id = %updated.id,
            status = ?status,
            "Command status changed"
        );
        Ok(updated)
    }

    fn active_of_same_type(&self, command: &Command) -> Result<Vec<Command>> {
        Ok(self
            .commands
            .list_for_device(&command.device_id)?
            .into_iter()
            .filter(|c| c.command_type == command.command_type && c.status.is_active())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackBus;
    use chrono::{Duration, Utc};
    use devlink_core::command::CommandType;
    use devlink_core::psk::PskStatus;
    use devlink_storage::{MemoryCommandStore, MemoryPskStore};
    use std::sync::Arc;
    use uuid::Uuid;

    struct Fixture {
        service: CommandService,
        psk: PskService,
        feedback: SharedFeedbackBus,
    }

    fn fixture() -> Fixture {
        let psk = PskService::new(Arc::new(MemoryPskStore::new()));
        let feedback = Arc::new(FeedbackBus::new(100));
        let service = CommandService::new(
            Arc::new(MemoryCommandStore::new()),
            psk.clone(),
            feedback.clone(),
        );
        Fixture {
            service,
            psk,
            feedback,
        }
    }

    #[tokio::test]
    async fn test_admit_reboot() {
        let f = fixture();
        let command = Command::new("dev", Uuid::new_v4(), CommandType::Reboot);
        let admitted = f.service.admit(command.clone()).await.unwrap();

        assert_eq!(admitted.status, CommandStatus::Pending);
        assert_eq!(f.service.pending_commands("dev").unwrap().len(), 1);

        let events = f.feedback.get_recent(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, FeedbackStatus::Received);
        assert_eq!(events[0].correlation_id, command.correlation_id);
    }

    #[tokio::test]
    async fn test_newer_command_cancels_older() {
        let f = fixture();
        let now = Utc::now();
        let first = Command::new("dev", Uuid::new_v4(), CommandType::Reboot)
            .with_timestamp(now - Duration::seconds(5));
        let second = Command::new("dev", Uuid::new_v4(), CommandType::Reboot).with_timestamp(now);

        f.service.admit(first.clone()).await.unwrap();
        f.service.admit(second.clone()).await.unwrap();

        let pending = f.service.pending_commands("dev").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);

        let cancelled: Vec<_> = f
            .feedback
            .get_recent(10)
            .await
            .into_iter()
            .filter(|e| e.status == FeedbackStatus::Cancelled)
            .collect();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].correlation_id, first.correlation_id);
    }

    #[tokio::test]
    async fn test_older_command_is_rejected() {
        let f = fixture();
        let now = Utc::now();
        let newer = Command::new("dev", Uuid::new_v4(), CommandType::Reboot).with_timestamp(now);
        let older = Command::new("dev", Uuid::new_v4(), CommandType::Reboot)
            .with_timestamp(now - Duration::seconds(5));

        f.service.admit(newer).await.unwrap();
        let err = f.service.admit(older).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), REASON_NEWER_COMMAND);
        assert_eq!(f.service.pending_commands("dev").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_key_rotation_requires_active_key() {
        let f = fixture();
        let command = Command::new("dev", Uuid::new_v4(), CommandType::KeyRotateSet);
        let err = f.service.admit(command).await.unwrap_err();
        assert_eq!(err.to_string(), REASON_NO_ACTIVE_KEY);
        assert!(f.feedback.get_recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_key_rotation_generates_ready_key() {
        let f = fixture();
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();

        let command = Command::new("dev", Uuid::new_v4(), CommandType::KeyRotateSet);
        f.service.admit(command).await.unwrap();

        let ready = f.psk.current_ready_key("dev").unwrap().unwrap();
        assert_eq!(ready.status, PskStatus::Ready);
        assert_eq!(ready.secret, "secret");
    }

    #[tokio::test]
    async fn test_enqueue_supersedes_older_command() {
        let f = fixture();
        let now = Utc::now();
        let first = Command::new("dev", Uuid::new_v4(), CommandType::KeyRotateSet)
            .with_timestamp(now - Duration::seconds(5))
            .with_status(CommandStatus::InProgress);
        let second = Command::new("dev", Uuid::new_v4(), CommandType::KeyRotateSet).with_timestamp(now);

        f.service.enqueue(&first).await.unwrap();
        f.service.enqueue(&second).await.unwrap();

        assert!(f.service.first_in_progress("dev").unwrap().is_none());
        let pending = f.service.pending_commands("dev").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.id);

        let events = f.feedback.get_recent(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, FeedbackStatus::Cancelled);
        assert_eq!(events[0].correlation_id, first.correlation_id);
    }

    #[tokio::test]
    async fn test_different_types_coexist() {
        let f = fixture();
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        f.service
            .admit(Command::new("dev", Uuid::new_v4(), CommandType::Reboot))
            .await
            .unwrap();
        f.service
            .admit(Command::new("dev", Uuid::new_v4(), CommandType::KeyRotate))
            .await
            .unwrap();
        assert_eq!(f.service.pending_commands("dev").unwrap().len(), 2);
    }
}
