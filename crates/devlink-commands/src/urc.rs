//! Interpretation of the result codes in a device report.

use devlink_core::command::{Command, CommandStatus};
use devlink_core::error::Result;
use devlink_core::report::DeviceReport;
use devlink_core::urc::{self, URC_PSK_SUCCESS};
use tracing::{debug, error, info, warn};

use crate::feedback::{FeedbackStatus, SharedFeedbackBus};
use crate::lifecycle::CommandService;
use crate::psk::PskService;

/// Applies device reports to key and command state.
#[derive(Clone)]
pub struct UrcInterpreter {
    psk: PskService,
    commands: CommandService,
    feedback: SharedFeedbackBus,
}

impl UrcInterpreter {
    pub fn new(psk: PskService, commands: CommandService, feedback: SharedFeedbackBus) -> Self {
        Self {
            psk,
            commands,
            feedback,
        }
    }

    /// Interpret one report.
    ///
    /// Fails with `NoPendingKey` when the report carries a key-rotation
    /// outcome but no key is awaiting confirmation.
    pub async fn interpret(&self, device_id: &str, report: &DeviceReport) -> Result<()> {
        let urcs = report.urcs();
        if urcs.is_empty() {
            debug!(category = "urc", device_id = %device_id, "Report without result codes");
            return Ok(());
        }
        debug!(category = "urc", device_id = %device_id, urcs = ?urcs, "Report result codes");

        if urcs.iter().any(|u| urc::is_psk_error_urc(u)) {
            return self.handle_psk_errors(device_id, urcs).await;
        }
        if urcs.iter().any(|u| u == URC_PSK_SUCCESS) {
            return self.handle_psk_success(device_id).await;
        }

        let Some(command) = self.commands.first_in_progress(device_id)? else {
            return Ok(());
        };

        match report.echoed_downlink() {
            Some(downlink) if downlink.contains(command.command_type.downlink()) => {
                self.handle_command_urcs(device_id, command, urcs).await
            }
            _ => {
                debug!(
                    category = "urc",
                    device_id = %device_id,
                    command_type = %command.command_type,
                    "Report does not refer to the command in progress"
                );
                Ok(())
            }
        }
    }

    async fn handle_psk_errors(&self, device_id: &str, urcs: &[String]) -> Result<()> {
        let errors: Vec<&String> = urcs.iter().filter(|u| urc::is_psk_error_urc(u)).collect();
        for code in &errors {
            warn!(
                category = "urc",
                device_id = %device_id,
                code = %code,
                "Key change failed: {}",
                urc::message_from_code(code)
            );
        }

        self.psk.invalidate_pending_key(device_id)?;

        let message = failure_message(device_id, errors);
        for command in self.commands.key_rotations_in_progress(device_id)? {
            let failed = self.commands.save_with_status(command, CommandStatus::Error)?;
            self.feedback
                .publish_for(&failed, FeedbackStatus::Error, message.clone())
                .await;
        }
        Ok(())
    }

    async fn handle_psk_success(&self, device_id: &str) -> Result<()> {
        self.psk.activate_pending_key(device_id)?;
        info!(category = "urc", device_id = %device_id, "Key changed successfully");

        for command in self.commands.key_rotations_in_progress(device_id)? {
            let done = self
                .commands
                .save_with_status(command, CommandStatus::Successful)?;
            self.feedback
                .publish_for(&done, FeedbackStatus::Successful, "Key changed successfully")
                .await;
        }
        Ok(())
    }

    async fn handle_command_urcs(&self, device_id: &str, command: Command, urcs: &[String]) -> Result<()> {
        let command_type = command.command_type;
        let errors: Vec<&String> = urcs
            .iter()
            .filter(|u| urc::is_error_urc(u) || command_type.is_error_urc(u))
            .collect();

        if !errors.is_empty() {
            let message = failure_message(device_id, errors);
            error!(category = "urc", device_id = %device_id, "{}", message);
            let failed = self.commands.save_with_status(command, CommandStatus::Error)?;
            self.feedback
                .publish_for(&failed, FeedbackStatus::Error, message)
                .await;
            return Ok(());
        }

        if !command_type.has_success_urc(urcs) {
            return Ok(());
        }

        let completion = command_type.spec().completion_urc;
        if urcs.iter().any(|u| u == completion) {
            let message = format!("{} for device {} went successfully", command_type, device_id);
            info!(category = "urc", device_id = %device_id, "{}", message);
            let done = self
                .commands
                .save_with_status(command, CommandStatus::Successful)?;
            self.feedback
                .publish_for(&done, FeedbackStatus::Successful, message)
                .await;
        } else {
            warn!(
                category = "urc",
                device_id = %device_id,
                command_type = %command_type,
                urcs = ?urcs,
                "Did not receive expected code {}",
                completion
            );
        }
        Ok(())
    }
}

fn failure_message(device_id: &str, codes: Vec<&String>) -> String {
    format!(
        "Command failed for device with id {} with code(s): {}",
        device_id,
        urc::describe_errors(codes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::FeedbackBus;
    use devlink_core::command::CommandType;
    use devlink_core::error::Error;
    use devlink_core::psk::PskStatus;
    use devlink_core::repository::CommandRepository;
    use devlink_storage::{MemoryCommandStore, MemoryPskStore};
    use std::sync::Arc;
    use uuid::Uuid;

    struct Fixture {
        interpreter: UrcInterpreter,
        psk: PskService,
        commands: Arc<MemoryCommandStore>,
        feedback: SharedFeedbackBus,
    }

    fn fixture() -> Fixture {
        let psk = PskService::new(Arc::new(MemoryPskStore::new()));
        let commands = Arc::new(MemoryCommandStore::new());
        let feedback = Arc::new(FeedbackBus::new(100));
        let service = CommandService::new(commands.clone(), psk.clone(), feedback.clone());
        Fixture {
            interpreter: UrcInterpreter::new(psk.clone(), service, feedback.clone()),
            psk,
            commands,
            feedback,
        }
    }

    fn report(urcs: &[&str], downlink: Option<&str>) -> DeviceReport {
        DeviceReport::new(
            urcs.iter().map(|u| u.to_string()).collect(),
            downlink.map(str::to_string),
        )
    }

    fn in_progress(f: &Fixture, command_type: CommandType) -> Command {
        let command = Command::new("dev", Uuid::new_v4(), command_type).with_status(CommandStatus::InProgress);
        f.commands.save(&command).unwrap();
        command
    }

    fn pending_key(f: &Fixture) {
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();
        f.psk.generate_ready_key("dev").unwrap();
        f.psk.mark_ready_as_pending("dev").unwrap();
    }

    #[tokio::test]
    async fn test_reboot_success() {
        let f = fixture();
        let command = in_progress(&f, CommandType::Reboot);

        f.interpreter
            .interpret("dev", &report(&["INIT", "WDR"], Some("!CMD:REBOOT")))
            .await
            .unwrap();

        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Successful);
        let events = f.feedback.get_recent(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, FeedbackStatus::Successful);
    }

    #[tokio::test]
    async fn test_success_without_completion_code_stays_in_progress() {
        let f = fixture();
        let command = in_progress(&f, CommandType::Reboot);

        f.interpreter
            .interpret("dev", &report(&["WDR"], Some("!CMD:REBOOT")))
            .await
            .unwrap();

        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::InProgress);
        assert!(f.feedback.get_recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_command_error() {
        let f = fixture();
        let command = in_progress(&f, CommandType::Reboot);

        f.interpreter
            .interpret("dev", &report(&["TS:ERR", "MSI:DLNA"], Some("!CMD:REBOOT")))
            .await
            .unwrap();

        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Error);
        let events = f.feedback.get_recent(10).await;
        assert_eq!(events[0].status, FeedbackStatus::Error);
        assert_eq!(
            events[0].message,
            "Command failed for device with id dev with code(s): TS:ERR (Error), MSI:DLNA (Downlink not allowed)"
        );
    }

    #[tokio::test]
    async fn test_report_about_other_downlink_is_ignored() {
        let f = fixture();
        let command = in_progress(&f, CommandType::Reboot);

        f.interpreter
            .interpret("dev", &report(&["INIT"], Some("!OTHER")))
            .await
            .unwrap();
        f.interpreter
            .interpret("dev", &report(&["INIT"], None))
            .await
            .unwrap();

        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::InProgress);
    }

    #[tokio::test]
    async fn test_psk_success_activates_pending_key() {
        let f = fixture();
        pending_key(&f);
        let command = in_progress(&f, CommandType::KeyRotateSet);

        f.interpreter
            .interpret("dev", &report(&["PSK:SET"], None))
            .await
            .unwrap();

        let active = f.psk.current_active_key("dev").unwrap().unwrap();
        assert_eq!(active.revision, 1);
        assert!(!f.psk.has_pending_key("dev").unwrap());
        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Successful);
    }

    #[tokio::test]
    async fn test_psk_error_invalidates_pending_key() {
        let f = fixture();
        pending_key(&f);
        let command = in_progress(&f, CommandType::KeyRotateSet);

        f.interpreter
            .interpret("dev", &report(&["PSK:DLER"], None))
            .await
            .unwrap();

        let keys = f.psk.current_active_key("dev").unwrap().unwrap();
        assert_eq!(keys.revision, 0);
        assert!(!f.psk.has_pending_key("dev").unwrap());
        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::Error);
        let events = f.feedback.get_recent(10).await;
        assert!(events[0].message.contains("PSK:DLER (Downlink (syntax) error)"));
    }

    #[tokio::test]
    async fn test_psk_outcome_without_pending_key() {
        let f = fixture();
        f.psk.set_initial_key("dev", "initialkey000000", "secret").unwrap();

        let err = f
            .interpreter
            .interpret("dev", &report(&["PSK:SET"], None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoPendingKey { .. }));

        let err = f
            .interpreter
            .interpret("dev", &report(&["PSK:EQER"], None))
            .await
            .unwrap_err();
        assert!(err.is_inconsistency());
        assert_eq!(
            f.psk.current_active_key("dev").unwrap().unwrap().status,
            PskStatus::Active
        );
    }

    #[tokio::test]
    async fn test_unrecognised_codes_change_nothing() {
        let f = fixture();
        let command = in_progress(&f, CommandType::Reboot);

        f.interpreter
            .interpret("dev", &report(&["ENPD", "TEL:RBT"], Some("!CMD:REBOOT")))
            .await
            .unwrap();
        f.interpreter.interpret("dev", &report(&[], None)).await.unwrap();

        let stored = f.commands.get("dev", &command.id).unwrap().unwrap();
        assert_eq!(stored.status, CommandStatus::InProgress);
        assert!(f.feedback.get_recent(10).await.is_empty());
    }
}
