//! Contribution route.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::contribution::{ContributeRequest, ContributionResponse};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// Contribute to a group.
///
/// POST /api/v1/groups/:group_id/contributions
///
/// Wallet and cash contributions settle immediately. Mobile-money
/// contributions stay pending until the gateway callback confirms them.
pub async fn contribute(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<ContributeRequest>,
) -> Result<ApiResponse<ContributionResponse>, ApiError> {
    let response = state
        .contributions
        .contribute(group_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(response).with_message("Contribution recorded"))
}
