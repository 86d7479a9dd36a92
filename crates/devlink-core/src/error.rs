//! Unified error handling for devlink.
//!
//! Absence of a record is never an error at the store level (`Ok(None)`).
//! It only becomes one of the inconsistency variants below when the protocol
//! says the record must exist.

/// Unified error type for devlink.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Command request rejected (unknown type, newer command present, ...).
    #[error("{0}")]
    Validation(String),

    /// A device reported a key-rotation outcome but no key awaits confirmation.
    #[error("No pending key present for device {device_id}")]
    NoPendingKey { device_id: String },

    /// A key-rotation downlink must be rendered but no key is ready.
    #[error("There is no new key ready to be set for device {device_id}")]
    NoReadyKey { device_id: String },

    /// A key operation needs the device's active key and there is none.
    #[error("No active key present for device {device_id}")]
    NoActiveKey { device_id: String },

    /// Storage/database errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Credential decryption errors.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// State implied by a device or a command that does not exist.
    pub fn is_inconsistency(&self) -> bool {
        matches!(
            self,
            Error::NoPendingKey { .. } | Error::NoReadyKey { .. } | Error::NoActiveKey { .. }
        )
    }

    /// Rejection of a command request.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistency_classification() {
        let err = Error::NoPendingKey {
            device_id: "dev".to_string(),
        };
        assert!(err.is_inconsistency());
        assert!(!err.is_validation());
        assert!(err.to_string().contains("dev"));

        assert!(!Error::Storage("down".to_string()).is_inconsistency());
        assert!(Error::Validation("bad".to_string()).is_validation());
    }

    #[test]
    fn test_validation_message_is_bare_reason() {
        let err = Error::Validation("Command unknown: FOO".to_string());
        assert_eq!(err.to_string(), "Command unknown: FOO");
    }
}
