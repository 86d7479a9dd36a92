//! Core types and contracts for devlink.
//!
//! This crate defines the protocol vocabulary shared by the other crates:
//! commands and their type table, pre-shared keys, result codes, device
//! reports, the downlink accumulator and the storage traits.

pub mod command;
pub mod config;
pub mod downlink;
pub mod error;
pub mod psk;
pub mod report;
pub mod repository;
pub mod urc;

pub use command::{Command, CommandId, CommandStatus, CommandType, CommandTypeSpec, DeviceId};
pub use config::AppConfig;
pub use downlink::{Downlink, RESPONSE_SUCCESS};
pub use error::{Error, Result};
pub use psk::{PreSharedKey, PskStatus};
pub use report::DeviceReport;
pub use repository::{
    CommandRepository, PskRepository, SharedCommandRepository, SharedPskRepository,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::command::{Command, CommandId, CommandStatus, CommandType};
    pub use crate::config::{AppConfig, env_vars};
    pub use crate::downlink::{Downlink, RESPONSE_SUCCESS};
    pub use crate::error::{Error, Result};
    pub use crate::psk::{PreSharedKey, PskStatus};
    pub use crate::report::DeviceReport;
    pub use crate::repository::{
        CommandRepository, PskRepository, SharedCommandRepository, SharedPskRepository,
    };
}
