//! Route table.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::ServerState;
use crate::handlers::{
    device_report_handler, get_psk_handler, health_handler, list_feedback_handler,
    submit_command_handler, submit_credentials_handler,
};

/// Maximum request body size (64KB).
pub const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024;

/// Build the router over the given state.
pub fn create_router(state: ServerState) -> Router {
    // Device-facing routes
    let device_routes = Router::new()
        .route("/sng/:identity", post(device_report_handler))
        .route("/psk", get(get_psk_handler));

    // Backend-facing routes
    let api_routes = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/commands", post(submit_command_handler))
        .route("/api/credentials", post(submit_credentials_handler))
        .route("/api/feedback", get(list_feedback_handler));

    device_routes
        .merge(api_routes)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
