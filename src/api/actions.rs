//! Form action endpoint.

use axum::{extract::State, Json};

use super::{success, ApiResult};
use crate::models::{ActionReport, ActionRequest};
use crate::AppState;

/// POST /api/actions - Add, ban, restore or remove a player.
pub async fn submit_action(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> ApiResult<ActionReport> {
    let (report, revision_id) = state.roster.apply(&request).await?;
    success(report, revision_id)
}
