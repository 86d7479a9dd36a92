//! Credential query endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, error};

use super::ServerState;

/// Header carrying the identity of the asking device.
pub const DEVICE_IDENTITY_HEADER: &str = "x-device-identity";

/// Return the active key of a device: `GET /psk`.
pub async fn get_psk_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<String, StatusCode> {
    let identity = headers
        .get(DEVICE_IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;
    debug!(category = "psk", device_id = %identity, "Retrieving active key");

    match state.engine.psk.current_active_key(identity) {
        Ok(Some(key)) => Ok(key.key),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(category = "psk", device_id = %identity, error = %e, "Failed to retrieve key");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
