//! Credential provisioning endpoint.

use axum::{Json, extract::State, http::StatusCode};
use devlink_commands::DeviceCredentials;
use tracing::debug;

use super::ServerState;
use crate::models::{ApiResult, ErrorResponse};

/// Queue encrypted device credentials: `POST /api/credentials`.
pub async fn submit_credentials_handler(
    State(state): State<ServerState>,
    Json(credentials): Json<DeviceCredentials>,
) -> ApiResult<StatusCode> {
    debug!(category = "api", device_id = %credentials.device_id, "Queueing credentials");

    state
        .credentials_tx
        .send(credentials)
        .await
        .map_err(|_| ErrorResponse::unavailable("Credentials listener is not running"))?;

    Ok(StatusCode::ACCEPTED)
}
