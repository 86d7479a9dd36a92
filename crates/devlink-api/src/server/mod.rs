//! HTTP server for devlink.
//!
//! Devices post reports and fetch credentials; the backend queues commands
//! and credentials and reads command outcomes.

pub mod router;
pub mod state;

pub use router::{MAX_REQUEST_BODY_SIZE, create_router};
pub use state::ServerState;

use std::net::SocketAddr;

use devlink_core::config::AppConfig;
use devlink_storage::Stores;
use tracing::info;

/// Open the stores, start the listeners and serve until shutdown.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let bind: SocketAddr = config.server.bind.parse()?;

    let stores = Stores::open(&config.storage)?;
    let state = ServerState::start(&config, stores)?;
    info!(
        category = "server",
        max_downlink_bytes = config.message.max_bytes,
        change_initial_psk = config.psk.change_initial_psk,
        "Engine started"
    );

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(category = "server", bind = %bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::shutdown::shutdown_signal())
        .await?;

    info!(category = "server", "Server shutdown complete");
    Ok(())
}
