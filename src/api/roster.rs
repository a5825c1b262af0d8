//! Roster read and clear endpoints.

use axum::extract::{Path, State};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::models::{ClearReport, Collection, CollectionView, PlayerLocation, RosterView};
use crate::AppState;

/// GET /api/roster - All three collections.
pub async fn get_roster(State(state): State<AppState>) -> ApiResult<RosterView> {
    let (view, revision_id) = state.roster.snapshot().await;
    success(view, revision_id)
}

/// GET /api/roster/{collection} - One collection.
pub async fn get_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CollectionView> {
    let collection = match name.parse::<Collection>() {
        Ok(collection) => collection,
        Err(message) => return error(AppError::NotFound(message), state.roster.revision_id().await),
    };

    let (view, revision_id) = state.roster.collection(collection).await;
    success(view, revision_id)
}

/// DELETE /api/roster/{collection} - Remove every record of one collection.
pub async fn clear_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<ClearReport> {
    let collection = match name.parse::<Collection>() {
        Ok(collection) => collection,
        Err(message) => return error(AppError::NotFound(message), state.roster.revision_id().await),
    };

    let (report, revision_id) = state.roster.clear(collection).await?;
    success(report, revision_id)
}

/// GET /api/players/{id} - Where a player currently is.
pub async fn get_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> ApiResult<PlayerLocation> {
    match state.roster.locate(&player_id).await {
        (Some(location), revision_id) => success(location, revision_id),
        (None, revision_id) => error(
            AppError::NotFound(format!("Player {} not found", player_id)),
            revision_id,
        ),
    }
}
