//! Meeting routes: lifecycle, attendance and minutes.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::meeting::{
    CreateMeetingRequest, MarkAttendanceRequest, Meeting, MeetingAttendance, MeetingMinutes,
    WriteMinutesRequest,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::response::ApiResponse;

/// Schedule a meeting.
///
/// POST /api/v1/groups/:group_id/meetings
///
/// Officers only. Virtual and hybrid meetings get a room id; the calendar
/// event is created after commit.
pub async fn create_meeting(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<CreateMeetingRequest>,
) -> Result<ApiResponse<Meeting>, ApiError> {
    let meeting = state
        .meetings
        .create(group_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(meeting).with_message("Meeting scheduled"))
}

/// POST /api/v1/meetings/:meeting_id/start
pub async fn start_meeting(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(meeting_id): Path<Uuid>,
) -> Result<ApiResponse<Meeting>, ApiError> {
    Ok(ApiResponse::ok(
        state.meetings.start(meeting_id, user_auth.user_id).await?,
    ))
}

/// End a meeting. Requires at least one attendee on record.
///
/// POST /api/v1/meetings/:meeting_id/end
pub async fn end_meeting(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(meeting_id): Path<Uuid>,
) -> Result<ApiResponse<Meeting>, ApiError> {
    Ok(ApiResponse::ok(
        state.meetings.end(meeting_id, user_auth.user_id).await?,
    ))
}

/// POST /api/v1/meetings/:meeting_id/cancel
pub async fn cancel_meeting(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(meeting_id): Path<Uuid>,
) -> Result<ApiResponse<Meeting>, ApiError> {
    Ok(ApiResponse::ok(
        state.meetings.cancel(meeting_id, user_auth.user_id).await?,
    ))
}

/// Record attendance for the caller or, for secretaries and above, another member.
///
/// POST /api/v1/meetings/:meeting_id/attendance
pub async fn mark_attendance(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<MarkAttendanceRequest>,
) -> Result<ApiResponse<MeetingAttendance>, ApiError> {
    let attendance = state
        .meetings
        .mark_attendance(meeting_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(attendance))
}

/// Write or replace draft minutes of an ended meeting.
///
/// PUT /api/v1/meetings/:meeting_id/minutes
pub async fn write_minutes(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<WriteMinutesRequest>,
) -> Result<ApiResponse<MeetingMinutes>, ApiError> {
    let minutes = state
        .meetings
        .write_minutes(meeting_id, user_auth.user_id, request)
        .await?;
    Ok(ApiResponse::ok(minutes))
}

/// POST /api/v1/meetings/:meeting_id/minutes/approve
pub async fn approve_minutes(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(meeting_id): Path<Uuid>,
) -> Result<ApiResponse<MeetingMinutes>, ApiError> {
    let minutes = state
        .meetings
        .approve_minutes(meeting_id, user_auth.user_id)
        .await?;
    Ok(ApiResponse::ok(minutes).with_message("Minutes approved"))
}
