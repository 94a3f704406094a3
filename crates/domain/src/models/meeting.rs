//! Meeting lifecycle models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use shared::validation::validate_schedule_horizon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meeting_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Scheduled,
    Active,
    Ended,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Active => "active",
            MeetingStatus::Ended => "ended",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    pub fn transition(self, next: MeetingStatus) -> EngineResult<MeetingStatus> {
        use MeetingStatus::*;
        let allowed = matches!(
            (self, next),
            (Scheduled, Active) | (Active, Ended) | (Scheduled, Cancelled)
        );
        if allowed {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meeting_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MeetingType {
    Physical,
    Virtual,
    Hybrid,
}

impl MeetingType {
    pub fn needs_room(self) -> bool {
        matches!(self, MeetingType::Virtual | MeetingType::Hybrid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendance_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceType {
    Physical,
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "minutes_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MinutesStatus {
    Draft,
    Approved,
}

impl MinutesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinutesStatus::Draft => "draft",
            MinutesStatus::Approved => "approved",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Meeting {
    pub id: Uuid,
    pub group_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub meeting_type: MeetingType,
    pub status: MeetingStatus,
    pub location: Option<String>,
    pub room_id: Option<String>,
    pub recording_enabled: bool,
    pub calendar_event_id: Option<String>,
    pub created_by: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MeetingAttendance {
    pub meeting_id: Uuid,
    pub user_id: Uuid,
    pub present: bool,
    pub attendance_type: AttendanceType,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MeetingMinutes {
    pub meeting_id: Uuid,
    pub content: String,
    pub status: MinutesStatus,
    pub written_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateMeetingRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_schedule_horizon"))]
    pub scheduled_at: DateTime<Utc>,

    #[validate(range(
        min = 5,
        max = 1440,
        message = "Duration must be between 5 and 1440 minutes"
    ))]
    pub duration_minutes: Option<i32>,

    pub meeting_type: MeetingType,

    #[validate(length(max = 200))]
    pub location: Option<String>,

    #[serde(default)]
    pub recording_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct MarkAttendanceRequest {
    /// Defaults to the caller.
    pub user_id: Option<Uuid>,
    #[serde(default = "default_present")]
    pub present: bool,
    pub attendance_type: AttendanceType,
}

fn default_present() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct WriteMinutesRequest {
    #[validate(length(
        min = 1,
        max = 50000,
        message = "Minutes must be between 1 and 50000 characters"
    ))]
    pub content: String,
}

/// Gate for ending a meeting: it must be active and have attendance.
pub fn check_can_end(status: MeetingStatus, attendance_rows: i64) -> EngineResult<MeetingStatus> {
    let next = status.transition(MeetingStatus::Ended)?;
    if attendance_rows < 1 {
        return Err(EngineError::AttendanceRequired);
    }
    Ok(next)
}
