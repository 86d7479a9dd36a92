//! Downlink composition from pending commands.

use devlink_core::command::{Command, CommandStatus, CommandType};
use devlink_core::downlink::Downlink;
use devlink_core::error::{Error, Result};
use tracing::{debug, info};

use crate::feedback::{FeedbackStatus, SharedFeedbackBus};
use crate::lifecycle::CommandService;
use crate::psk::{PskService, psk_token};

/// Packs pending commands into the next downlink of a device.
#[derive(Clone)]
pub struct DownlinkComposer {
    psk: PskService,
    commands: CommandService,
    feedback: SharedFeedbackBus,
    max_bytes: usize,
}

impl DownlinkComposer {
    pub fn new(
        psk: PskService,
        commands: CommandService,
        feedback: SharedFeedbackBus,
        max_bytes: usize,
    ) -> Self {
        Self {
            psk,
            commands,
            feedback,
            max_bytes,
        }
    }

    /// Build the downlink for a device and mark the included commands
    /// IN_PROGRESS. Returns `0` when nothing is sent.
    pub async fn compose(&self, device_id: &str) -> Result<String> {
        let mut eligible = Vec::new();
        for command in self.commands.pending_commands(device_id)? {
            if self.can_be_sent(&command)? {
                eligible.push(command);
            }
        }

        let mut downlink = Downlink::new(self.max_bytes);
        if eligible.is_empty() {
            return Ok(downlink.render());
        }
        info!(
            category = "downlink",
            device_id = %device_id,
            pending = %command_types(&eligible),
            "Device has pending commands"
        );

        let mut included = Vec::new();
        for command in eligible {
            let token = self.token_for(&command)?;
            if downlink.add_if_it_fits(token) {
                included.push(command);
            } else {
                debug!(
                    category = "downlink",
                    device_id = %device_id,
                    command_type = %command.command_type,
                    "Command does not fit in downlink"
                );
            }
        }

        info!(
            category = "downlink",
            device_id = %device_id,
            sent = %command_types(&included),
            "Commands that will be sent"
        );
        for command in included {
            self.set_in_progress(command).await?;
        }

        let rendered = downlink.render();
        debug!(category = "downlink", device_id = %device_id, downlink = %rendered, "Downlink composed");
        Ok(rendered)
    }

    fn can_be_sent(&self, command: &Command) -> Result<bool> {
        match command.command_type {
            CommandType::KeyRotateSet => self.psk.ready_for_rotation_commit(&command.device_id),
            _ => Ok(true),
        }
    }

    fn token_for(&self, command: &Command) -> Result<String> {
        if !command.command_type.is_key_rotation() {
            return Ok(command.command_type.downlink().to_string());
        }

        let ready = self
            .psk
            .current_ready_key(&command.device_id)?
            .ok_or_else(|| Error::NoReadyKey {
                device_id: command.device_id.clone(),
            })?;
        Ok(psk_token(&ready, command.command_type == CommandType::KeyRotateSet))
    }

    async fn set_in_progress(&self, command: Command) -> Result<()> {
        if command.command_type == CommandType::KeyRotateSet {
            info!(category = "downlink", device_id = %command.device_id, "Device needs key change");
            self.psk.mark_ready_as_pending(&command.device_id)?;
        }
        let command = self
            .commands
            .save_with_status(command, CommandStatus::InProgress)?;
        self.feedback
            .publish_for(&command, FeedbackStatus::InProgress, "Command sent to device")
            .await;
        Ok(())
    }
}

fn command_types(commands: &[Command]) -> String {
    commands
        .iter()
        .map(|c| c.command_type.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackBus;
    use chrono::{Duration, Utc};
    use devlink_core::repository::CommandRepository;
    use devlink_storage::{MemoryCommandStore, MemoryPskStore};
    use std::sync::Arc;
    use uuid::Uuid;

    struct Fixture {
        composer: DownlinkComposer,
        psk: PskService,
        commands: Arc<MemoryCommandStore>,
    }

    fn fixture(max_bytes: usize) -> Fixture {
        let psk = PskService::new(Arc::new(MemoryPskStore::new()));
        let commands = Arc::new(MemoryCommandStore::new());
        let feedback = Arc::new(FeedbackBus::new(100));
        let service = CommandService::new(commands.clone(), psk.clone(), feedback.clone());
        Fixture {
            composer: DownlinkComposer::new(psk.clone(), service, feedback, max_bytes),
            psk,
            commands,
        }
    }

    fn pending(f: &Fixture, command_type: CommandType, age_secs: i64) -> Command {
        let command = Command::new("dev", Uuid::new_v4(), command_type)
            .with_timestamp(Utc::now() - Duration::seconds(age_secs));
        f.commands.save(&command).unwrap();
        command
    }

    fn status(f: &Fixture, command: &Command) -> CommandStatus {
        f.commands.get("dev", &command.id).unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_nothing_to_send() {
        let f = fixture(1024);
        assert_eq!(f.composer.compose("dev").await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_reboot_downlink() {
        let f = fixture(1024);
        let command = pending(&f, CommandType::Reboot, 0);
        assert_eq!(f.composer.compose("dev").await.unwrap(), "!CMD:REBOOT");
        assert_eq!(status(&f, &command), CommandStatus::InProgress);
        assert_eq!(f.composer.compose("dev").await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_key_rotation_tokens() {
        let f = fixture(1024);
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        let ready = f.psk.generate_ready_key("dev").unwrap();
        let rotate = pending(&f, CommandType::KeyRotate, 10);
        let set = pending(&f, CommandType::KeyRotateSet, 5);

        let downlink = f.composer.compose("dev").await.unwrap();
        assert_eq!(
            downlink,
            format!("!{};{}", psk_token(&ready, false), psk_token(&ready, true))
        );
        assert_eq!(status(&f, &rotate), CommandStatus::InProgress);
        assert_eq!(status(&f, &set), CommandStatus::InProgress);

        let pending_key = f.psk.current_ready_key("dev").unwrap();
        assert!(pending_key.is_none());
        assert!(f.psk.has_pending_key("dev").unwrap());
    }

    #[tokio::test]
    async fn test_rotation_commit_waits_for_ready_key() {
        let f = fixture(1024);
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        let set = pending(&f, CommandType::KeyRotateSet, 0);

        assert_eq!(f.composer.compose("dev").await.unwrap(), "0");
        assert_eq!(status(&f, &set), CommandStatus::Pending);
    }

    #[tokio::test]
    async fn test_key_rotate_without_ready_key_fails() {
        let f = fixture(1024);
        pending(&f, CommandType::KeyRotate, 0);
        let err = f.composer.compose("dev").await.unwrap_err();
        assert!(matches!(err, Error::NoReadyKey { .. }));
    }

    #[tokio::test]
    async fn test_budget_skips_commands_that_do_not_fit() {
        // "!CMD:REBOOT" is 11 bytes, a key token is 85
        let f = fixture(20);
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        f.psk.generate_ready_key("dev").unwrap();
        let rotate = pending(&f, CommandType::KeyRotate, 10);
        let reboot = pending(&f, CommandType::Reboot, 5);

        assert_eq!(f.composer.compose("dev").await.unwrap(), "!CMD:REBOOT");
        assert_eq!(status(&f, &rotate), CommandStatus::Pending);
        assert_eq!(status(&f, &reboot), CommandStatus::InProgress);
    }
}
