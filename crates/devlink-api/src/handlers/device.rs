//! Device report endpoint.
//!
//! A device posts its report and receives the next downlink as plain text in
//! the same response. Any failure is answered with a bare 500 so the device
//! retries on its next report.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use devlink_core::report::DeviceReport;
use tracing::{debug, warn};

use super::ServerState;

/// Handle a device report: `POST /sng/:identity`.
pub async fn device_report_handler(
    State(state): State<ServerState>,
    Path(identity): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<String, StatusCode> {
    debug!(category = "device", device_id = %identity, "Processing message {}", body);

    let report = DeviceReport::parse(&body).unwrap_or_else(|e| {
        warn!(category = "device", device_id = %identity, error = %e, "Ignoring malformed result codes");
        DeviceReport::default()
    });

    state
        .engine
        .sessions
        .handle_report(&identity, &report)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
