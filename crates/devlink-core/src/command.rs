//! Command data structures.
//!
//! Per-type protocol behaviour lives in a static table so that adding a
//! command type means adding a row, not a branch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique command identifier.
pub type CommandId = Uuid;

/// Device identifier.
pub type DeviceId = String;

/// Protocol behaviour of one command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTypeSpec {
    /// External name, as used in command requests.
    pub name: &'static str,
    /// Token sent to the device; also what the device echoes back.
    pub downlink: &'static str,
    /// Codes signalling the device handled the command.
    pub urcs_success: &'static [&'static str],
    /// Codes signalling the command failed.
    pub urcs_error: &'static [&'static str],
    /// Success code that completes the command.
    pub completion_urc: &'static str,
    /// Whether admitting this command generates a new key.
    pub key_rotation: bool,
}

const COMMAND_TYPES: [CommandTypeSpec; 3] = [
    CommandTypeSpec {
        name: "KEY_ROTATE",
        downlink: "PSK",
        urcs_success: &["PSK:TMP"],
        urcs_error: &["PSK:DLER", "PSK:HSER"],
        completion_urc: "PSK:TMP",
        key_rotation: true,
    },
    CommandTypeSpec {
        name: "KEY_ROTATE_SET",
        downlink: "PSK:SET",
        urcs_success: &["PSK:SET"],
        urcs_error: &["PSK:DLER", "PSK:HSER", "PSK:EQER"],
        completion_urc: "PSK:SET",
        key_rotation: true,
    },
    CommandTypeSpec {
        name: "REBOOT",
        downlink: "CMD:REBOOT",
        urcs_success: &["INIT", "WDR"],
        urcs_error: &[],
        completion_urc: "INIT",
        key_rotation: false,
    },
];

/// Command types understood by devices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    /// Send a new key to the device (temporary, not yet in use).
    KeyRotate,
    /// Send a new key and instruct the device to switch to it.
    KeyRotateSet,
    /// Reboot the device.
    Reboot,
}

impl CommandType {
    /// All command types, in table order.
    pub const ALL: [CommandType; 3] = [
        CommandType::KeyRotate,
        CommandType::KeyRotateSet,
        CommandType::Reboot,
    ];

    /// Protocol behaviour of this type.
    pub fn spec(&self) -> &'static CommandTypeSpec {
        match self {
            CommandType::KeyRotate => &COMMAND_TYPES[0],
            CommandType::KeyRotateSet => &COMMAND_TYPES[1],
            CommandType::Reboot => &COMMAND_TYPES[2],
        }
    }

    /// Look up a type by its external name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.spec().name == name)
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }

    /// Fixed downlink token of this type.
    pub fn downlink(&self) -> &'static str {
        self.spec().downlink
    }

    pub fn is_key_rotation(&self) -> bool {
        self.spec().key_rotation
    }

    /// Check whether any of the codes signals success for this type.
    pub fn has_success_urc(&self, urcs: &[String]) -> bool {
        self.spec()
            .urcs_success
            .iter()
            .any(|success| urcs.iter().any(|urc| urc == success))
    }

    /// Check whether a code is an error specific to this type.
    pub fn is_error_urc(&self, code: &str) -> bool {
        self.spec().urcs_error.contains(&code)
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Command status tracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    /// Waiting to be included in a downlink
    Pending,
    /// Sent to the device, waiting for its result codes
    InProgress,
    /// Device confirmed the command
    Successful,
    /// Device reported a failure
    Error,
    /// Superseded by a newer command of the same type
    Cancelled,
}

impl CommandStatus {
    /// Check if command is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Successful | CommandStatus::Error | CommandStatus::Cancelled
        )
    }

    /// PENDING or IN_PROGRESS.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// A command issued to a device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    pub device_id: DeviceId,
    /// Ties the command to the external request that created it
    pub correlation_id: Uuid,
    pub timestamp_issued: DateTime<Utc>,
    pub command_type: CommandType,
    /// Optional free-form value
    pub value: Option<String>,
    pub status: CommandStatus,
}

impl Command {
    /// Create a new PENDING command issued now.
    pub fn new(device_id: impl Into<DeviceId>, correlation_id: Uuid, command_type: CommandType) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            correlation_id,
            timestamp_issued: Utc::now(),
            command_type,
            value: None,
            status: CommandStatus::Pending,
        }
    }

    /// Set the free-form value.
    pub fn with_value(mut self, value: Option<String>) -> Self {
        self.value = value;
        self
    }

    /// Set the issue timestamp.
    pub fn with_timestamp(mut self, timestamp_issued: DateTime<Utc>) -> Self {
        self.timestamp_issued = timestamp_issued;
        self
    }

    /// Copy of this command with a new status.
    pub fn with_status(mut self, status: CommandStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_table_lookup() {
        assert_eq!(CommandType::from_name("REBOOT"), Some(CommandType::Reboot));
        assert_eq!(
            CommandType::from_name("KEY_ROTATE_SET"),
            Some(CommandType::KeyRotateSet)
        );
        assert_eq!(CommandType::from_name("reboot"), None);
        assert_eq!(CommandType::from_name("UNKNOWN"), None);

        assert_eq!(CommandType::Reboot.downlink(), "CMD:REBOOT");
        assert_eq!(CommandType::KeyRotateSet.downlink(), "PSK:SET");
        assert!(CommandType::KeyRotate.is_key_rotation());
        assert!(!CommandType::Reboot.is_key_rotation());
    }

    #[test]
    fn test_names_match_serde() {
        for t in CommandType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.name()));
        }
    }

    #[test]
    fn test_success_and_error_urcs() {
        let urcs = vec!["WDR".to_string()];
        assert!(CommandType::Reboot.has_success_urc(&urcs));
        assert!(!CommandType::Reboot.is_error_urc("WDR"));

        assert!(CommandType::KeyRotateSet.is_error_urc("PSK:EQER"));
        assert!(!CommandType::KeyRotate.is_error_urc("PSK:EQER"));
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(CommandStatus::Successful.is_terminal());
        assert!(CommandStatus::Error.is_terminal());
        assert!(CommandStatus::Cancelled.is_terminal());
        assert!(CommandStatus::Pending.is_active());
        assert!(CommandStatus::InProgress.is_active());
    }

    #[test]
    fn test_command_creation() {
        let correlation_id = Uuid::new_v4();
        let cmd = Command::new("device1", correlation_id, CommandType::Reboot)
            .with_value(Some("now".to_string()));

        assert_eq!(cmd.device_id, "device1");
        assert_eq!(cmd.correlation_id, correlation_id);
        assert_eq!(cmd.status, CommandStatus::Pending);
        assert_eq!(cmd.value.as_deref(), Some("now"));

        let done = cmd.clone().with_status(CommandStatus::Successful);
        assert_eq!(done.id, cmd.id);
        assert_eq!(done.status, CommandStatus::Successful);
    }
}
