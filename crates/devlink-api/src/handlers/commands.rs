//! Command ingestion endpoint.

use axum::{Json, extract::State, http::StatusCode};
use devlink_commands::ExternalCommand;
use serde_json::{Value, json};
use tracing::debug;

use super::ServerState;
use crate::models::{ApiResult, ErrorResponse};

/// Queue a command request: `POST /api/commands`.
///
/// The outcome is reported through feedback events.
pub async fn submit_command_handler(
    State(state): State<ServerState>,
    Json(request): Json<ExternalCommand>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    debug!(
        category = "api",
        device_id = %request.device_id,
        command = %request.command,
        "Queueing command request"
    );
    let correlation_id = request.correlation_id;

    state
        .command_tx
        .send(request)
        .await
        .map_err(|_| ErrorResponse::unavailable("Command listener is not running"))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "correlation_id": correlation_id })),
    ))
}
