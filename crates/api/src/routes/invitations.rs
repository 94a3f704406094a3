//! Invitation inbox routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::invitation::{Invitation, RespondInvitationRequest};
use shared::pagination::{PageParams, PageQuery};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// List the caller's pending invitations.
///
/// GET /api/v1/invitations
pub async fn list_invitations(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<Invitation>>, ApiError> {
    let page = PageParams::from(query);
    let (invitations, total) = state
        .groups
        .list_invitations(user_auth.user_id, page)
        .await?;
    Ok(ApiResponse::page(invitations, page, total))
}

/// Accept or decline an invitation.
///
/// POST /api/v1/invitations/:invitation_id/respond
pub async fn respond_invitation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(invitation_id): Path<Uuid>,
    Json(request): Json<RespondInvitationRequest>,
) -> Result<ApiResponse<Invitation>, ApiError> {
    let invitation = state
        .groups
        .respond_invitation(invitation_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(invitation))
}
