//! Rotating payout cycle routes.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::rotating_payout::{AdvanceOutcome, CreateCycleRequest, CycleDetail};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// Start a rotating payout cycle.
///
/// POST /api/v1/groups/:group_id/cycles
///
/// Officers only. At most one active cycle per group.
pub async fn create_cycle(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreateCycleRequest>,
) -> Result<ApiResponse<CycleDetail>, ApiError> {
    let cycle = state
        .cycles
        .create(group_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(cycle).with_message("Cycle started"))
}

/// GET /api/v1/cycles/:cycle_id
pub async fn get_cycle(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(cycle_id): Path<Uuid>,
) -> Result<ApiResponse<CycleDetail>, ApiError> {
    Ok(ApiResponse::ok(
        state.cycles.get(cycle_id, user_auth.user_id).await?,
    ))
}

/// Re-evaluate the current round and advance it when complete.
///
/// POST /api/v1/cycles/:cycle_id/advance
pub async fn advance_cycle(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(cycle_id): Path<Uuid>,
) -> Result<ApiResponse<AdvanceOutcome>, ApiError> {
    Ok(ApiResponse::ok(
        state.cycles.advance(cycle_id, user_auth.user_id).await?,
    ))
}
