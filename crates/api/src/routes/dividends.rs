//! Share holding and dividend routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::dividend::{
    DeclareDividendRequest, DividendDeclaration, DividendPayment, DividendProcessingSummary,
    SetShareHoldingRequest, ShareHolding,
};
use shared::pagination::{PageParams, PageQuery};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// Set a member's share count.
///
/// PUT /api/v1/groups/:group_id/shares/:user_id
pub async fn set_share_holding(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path((group_id, member_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetShareHoldingRequest>,
) -> Result<ApiResponse<ShareHolding>, ApiError> {
    let holding = state
        .dividends
        .set_holding(group_id, member_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(holding))
}

/// Declare a dividend as a total or per-share amount.
///
/// POST /api/v1/groups/:group_id/dividends
pub async fn declare(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<DeclareDividendRequest>,
) -> Result<ApiResponse<DividendDeclaration>, ApiError> {
    let declaration = state
        .dividends
        .declare(group_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(declaration).with_message("Dividend declared"))
}

/// Approve a declaration and create one payment per holder.
///
/// POST /api/v1/dividends/:declaration_id/approve
pub async fn approve(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(declaration_id): Path<Uuid>,
) -> Result<ApiResponse<DividendDeclaration>, ApiError> {
    let declaration = state
        .dividends
        .approve(declaration_id, user_auth.user_id)
        .await?;
    Ok(ApiResponse::ok(declaration).with_message("Dividend approved"))
}

/// Pay out every pending payment from the group wallet.
///
/// POST /api/v1/dividends/:declaration_id/process
pub async fn process(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(declaration_id): Path<Uuid>,
) -> Result<ApiResponse<DividendProcessingSummary>, ApiError> {
    let summary = state
        .dividends
        .process(declaration_id, user_auth.user_id)
        .await?;
    Ok(ApiResponse::ok(summary))
}

/// GET /api/v1/dividends/:declaration_id/payments
pub async fn list_payments(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(declaration_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<DividendPayment>>, ApiError> {
    let page = PageParams::from(query);
    let (payments, total) = state
        .dividends
        .list_payments(declaration_id, user_auth.user_id, page)
        .await?;
    Ok(ApiResponse::page(payments, page, total))
}
