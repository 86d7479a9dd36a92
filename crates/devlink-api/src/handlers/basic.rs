//! Basic handlers - health check.

use axum::{Json, extract::State};
use serde::Serialize;

use super::ServerState;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: &'static str,
    pub uptime: u64,
    /// Devices with a report or ingestion in flight
    pub active_sessions: usize,
    pub listeners_running: bool,
}

/// Liveness check with uptime.
pub async fn health_handler(State(state): State<ServerState>) -> Json<HealthStatus> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    let listeners_running = state.listeners_running();

    Json(HealthStatus {
        status: if listeners_running { "ok" } else { "degraded" }.to_string(),
        service: "devlink".to_string(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: uptime.max(0) as u64,
        active_sessions: state.engine.gate.active_sessions(),
        listeners_running,
    })
}
