//! Recent command outcomes.

use axum::{
    Json,
    extract::{Query, State},
};
use devlink_commands::CommandFeedback;
use serde::Deserialize;

use super::ServerState;

const DEFAULT_LIMIT: usize = 100;

/// Query parameters for feedback listing.
#[derive(Debug, Default, Deserialize)]
pub struct FeedbackQueryParams {
    /// Only outcomes of this device, newest first
    pub device_id: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

/// List recent outcomes: `GET /api/feedback`.
pub async fn list_feedback_handler(
    State(state): State<ServerState>,
    Query(params): Query<FeedbackQueryParams>,
) -> Json<Vec<CommandFeedback>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let feedback = match params.device_id {
        Some(device_id) => state.engine.feedback.get_by_device(&device_id, limit).await,
        None => state.engine.feedback.get_recent(limit).await,
    };
    Json(feedback)
}
