//! Notification feed routes.

use axum::extract::{Path, Query, State};
use domain::models::notification::{FeedItem, UnreadCount};
use serde::Serialize;
use shared::pagination::{PageParams, PageQuery};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// Unified feed of stored and derived notifications, newest first.
///
/// GET /api/v1/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Query(query): Query<PageQuery>,
) -> Result<ApiResponse<Vec<FeedItem>>, ApiError> {
    let page = PageParams::from(query);
    let (items, total) = state.notifications.feed(user_auth.user_id, page).await?;
    Ok(ApiResponse::page(items, page, total))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<ApiResponse<UnreadCount>, ApiError> {
    Ok(ApiResponse::ok(
        state.notifications.unread_count(user_auth.user_id).await?,
    ))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<ApiResponse<MarkAllReadResponse>, ApiError> {
    let updated = state.notifications.mark_all_read(user_auth.user_id).await?;
    Ok(ApiResponse::ok(MarkAllReadResponse { updated }))
}

/// Mark one stored notification read.
///
/// POST /api/v1/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiError> {
    state.notifications.mark_read(user_auth.user_id, id).await?;
    Ok(ApiResponse::ok(()).with_message("Notification marked as read"))
}

/// Delete a stored notification, or dismiss a derived one.
///
/// DELETE /api/v1/notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    state.notifications.delete(user_auth.user_id, &id).await?;
    Ok(ApiResponse::ok(()).with_message("Notification removed"))
}
