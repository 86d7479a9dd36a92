//! Web API for devlink.
//!
//! Exposes the device session engine over HTTP.

pub mod handlers;
pub mod models;
pub mod server;
pub mod shutdown;

pub use server::{ServerState, create_router, run};
