//! Meeting entities.

use chrono::{DateTime, Utc};
use domain::models::meeting::{
    AttendanceType, Meeting, MeetingAttendance, MeetingMinutes, MeetingStatus, MeetingType,
    MinutesStatus,
};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct MeetingEntity {
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

pub(crate) const MEETING_COLUMNS: &str = "id, group_id, title, description, scheduled_at, \
    duration_minutes, meeting_type, status, location, room_id, recording_enabled, \
    calendar_event_id, created_by, started_at, ended_at, created_at, updated_at";

impl From<MeetingEntity> for Meeting {
    fn from(entity: MeetingEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            title: entity.title,
            description: entity.description,
            scheduled_at: entity.scheduled_at,
            duration_minutes: entity.duration_minutes,
            meeting_type: entity.meeting_type,
            status: entity.status,
            location: entity.location,
            room_id: entity.room_id,
            recording_enabled: entity.recording_enabled,
            calendar_event_id: entity.calendar_event_id,
            created_by: entity.created_by,
            started_at: entity.started_at,
            ended_at: entity.ended_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AttendanceEntity {
    pub meeting_id: Uuid,
    pub user_id: Uuid,
    pub present: bool,
    pub attendance_type: AttendanceType,
    pub recorded_by: Uuid,
    pub recorded_at: DateTime<Utc>,
}

impl From<AttendanceEntity> for MeetingAttendance {
    fn from(entity: AttendanceEntity) -> Self {
        Self {
            meeting_id: entity.meeting_id,
            user_id: entity.user_id,
            present: entity.present,
            attendance_type: entity.attendance_type,
            recorded_by: entity.recorded_by,
            recorded_at: entity.recorded_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MinutesEntity {
    pub meeting_id: Uuid,
    pub content: String,
    pub status: MinutesStatus,
    pub written_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<MinutesEntity> for MeetingMinutes {
    fn from(entity: MinutesEntity) -> Self {
        Self {
            meeting_id: entity.meeting_id,
            content: entity.content,
            status: entity.status,
            written_by: entity.written_by,
            approved_by: entity.approved_by,
            approved_at: entity.approved_at,
            updated_at: entity.updated_at,
        }
    }
}
