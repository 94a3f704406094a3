//! Wallet and ledger history routes.

use axum::extract::{Path, Query, State};
use domain::models::wallet::{LedgerEntry, WalletView};
use shared::pagination::{PageParams, PageQuery};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// The caller's personal wallet with recent entries.
///
/// GET /api/v1/wallet
pub async fn my_wallet(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<ApiResponse<WalletView>, ApiError> {
    Ok(ApiResponse::ok(
        state.wallets.my_wallet(user_auth.user_id).await?,
    ))
}

/// Ledger entries the caller initiated or received.
///
/// GET /api/v1/wallet/transactions
pub async fn my_transactions(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<LedgerEntry>>, ApiError> {
    let page = PageParams::from(query);
    let (entries, total) = state.wallets.transactions(user_auth.user_id, page).await?;
    Ok(ApiResponse::page(entries, page, total))
}

/// A group's wallet. Members only.
///
/// GET /api/v1/groups/:group_id/wallet
pub async fn group_wallet(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<ApiResponse<WalletView>, ApiError> {
    Ok(ApiResponse::ok(
        state
            .wallets
            .group_wallet(group_id, user_auth.user_id)
            .await?,
    ))
}
