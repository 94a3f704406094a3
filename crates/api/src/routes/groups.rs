//! Group routes: creation, listing, detail, roles and invitations.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::group::{
    CreateGroupRequest, GroupDetail, GroupSummary, Membership, UpdateMemberRoleRequest,
};
use domain::models::invitation::{Invitation, SendInvitationRequest};
use shared::pagination::{PageParams, PageQuery};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// Create a new group.
///
/// POST /api/v1/groups
///
/// Requires JWT authentication. The creator becomes chairperson and the
/// group wallet is opened.
pub async fn create_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateGroupRequest>,
) -> Result<ApiResponse<GroupDetail>, ApiError> {
    let detail = state.groups.create(user_auth.user_id, request).await?;
    Ok(ApiResponse::created(detail).with_message("Group created"))
}

/// List groups the caller belongs to.
///
/// GET /api/v1/groups
pub async fn list_groups(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<GroupSummary>>, ApiError> {
    let page = PageParams::from(query);
    let (groups, total) = state.groups.list_mine(user_auth.user_id, page).await?;
    Ok(ApiResponse::page(groups, page, total))
}

/// Get group detail.
///
/// GET /api/v1/groups/:group_id
///
/// Members only, except for system admins.
pub async fn get_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<GroupDetail>, ApiError> {
    let detail = state
        .groups
        .get(group_id, user_auth.user_id, user_auth.is_admin())
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// Change a member's role.
///
/// PUT /api/v1/groups/:group_id/members/:user_id/role
///
/// Chairperson only.
pub async fn update_member_role(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateMemberRoleRequest>,
) -> Result<ApiResponse<Membership>, ApiError> {
    let membership = state
        .groups
        .update_role(group_id, member_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(membership).with_message("Role updated"))
}

/// Invite a user to the group.
///
/// POST /api/v1/groups/:group_id/invitations
///
/// Officers only.
pub async fn send_invitation(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<SendInvitationRequest>,
) -> Result<ApiResponse<Invitation>, ApiError> {
    let invitation = state
        .groups
        .invite(group_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(invitation).with_message("Invitation sent"))
}
