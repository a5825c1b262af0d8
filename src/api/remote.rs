//! Remote sync endpoint.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::SyncOutcome;
use crate::AppState;

/// POST /api/sync - Push the roster files to the remote repository now.
pub async fn push_remote(State(state): State<AppState>) -> ApiResult<Vec<SyncOutcome>> {
    let (outcomes, revision_id) = state.roster.push_remote().await?;
    success(outcomes, revision_id)
}
