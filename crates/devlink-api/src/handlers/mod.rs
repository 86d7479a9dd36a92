//! API handlers organized by domain.

pub mod basic;
pub mod commands;
pub mod credentials;
pub mod device;
pub mod feedback;
pub mod psk;

// Re-export ServerState so handlers can use it
pub use crate::server::ServerState;

pub use basic::health_handler;
pub use commands::submit_command_handler;
pub use credentials::submit_credentials_handler;
pub use device::device_report_handler;
pub use feedback::list_feedback_handler;
pub use psk::get_psk_handler;
