//! Meeting, attendance and minutes repository.

use domain::models::meeting::{AttendanceType, CreateMeetingRequest, MeetingStatus, MinutesStatus};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::meeting::MEETING_COLUMNS;
use crate::entities::{AttendanceEntity, MeetingEntity, MinutesEntity};
use crate::metrics::QueryTimer;

const MINUTES_COLUMNS: &str =
    "meeting_id, content, status, written_by, approved_by, approved_at, updated_at";

#[derive(Clone)]
pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MeetingEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_meeting_by_id");
        let result = sqlx::query_as::<_, MeetingEntity>(&format!(
            "SELECT {} FROM meetings WHERE id = $1",
            MEETING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Store the calendar host's event id. Runs after the meeting has committed.
    pub async fn set_calendar_event(
        &self,
        id: Uuid,
        calendar_event_id: &str,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_meeting_calendar_event");
        let result = sqlx::query(
            "UPDATE meetings SET calendar_event_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(calendar_event_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn find_attendance(
        &self,
        meeting_id: Uuid,
    ) -> Result<Vec<AttendanceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_meeting_attendance");
        let result = sqlx::query_as::<_, AttendanceEntity>(
            r#"
            SELECT meeting_id, user_id, present, attendance_type, recorded_by, recorded_at
            FROM meeting_attendance
            WHERE meeting_id = $1
            ORDER BY recorded_at
            "#,
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

pub async fn insert_meeting(
    conn: &mut PgConnection,
    group_id: Uuid,
    request: &CreateMeetingRequest,
    duration_minutes: i32,
    room_id: Option<&str>,
    created_by: Uuid,
) -> Result<MeetingEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_meeting");
    let result = sqlx::query_as::<_, MeetingEntity>(&format!(
        r#"
        INSERT INTO meetings (group_id, title, description, scheduled_at, duration_minutes,
            meeting_type, location, room_id, recording_enabled, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        MEETING_COLUMNS
    ))
    .bind(group_id)
    .bind(&request.title)
    .bind(&request.description)
    .bind(request.scheduled_at)
    .bind(duration_minutes)
    .bind(request.meeting_type)
    .bind(&request.location)
    .bind(room_id)
    .bind(request.recording_enabled)
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn lock_meeting(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<MeetingEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_meeting");
    let result = sqlx::query_as::<_, MeetingEntity>(&format!(
        "SELECT {} FROM meetings WHERE id = $1 FOR UPDATE",
        MEETING_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

/// Set a new status, stamping `started_at` / `ended_at` on the matching transitions.
pub async fn set_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: MeetingStatus,
) -> Result<MeetingEntity, sqlx::Error> {
    let timer = QueryTimer::new("set_meeting_status");
    let result = sqlx::query_as::<_, MeetingEntity>(&format!(
        r#"
        UPDATE meetings
        SET status = $2,
            started_at = CASE WHEN $2 = 'active'::meeting_status THEN NOW() ELSE started_at END,
            ended_at = CASE WHEN $2 = 'ended'::meeting_status THEN NOW() ELSE ended_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        MEETING_COLUMNS
    ))
    .bind(id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn count_attendance(conn: &mut PgConnection, meeting_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM meeting_attendance WHERE meeting_id = $1")
        .bind(meeting_id)
        .fetch_one(&mut *conn)
        .await
}

/// Record attendance; a second mark for the same member replaces the first.
pub async fn upsert_attendance(
    conn: &mut PgConnection,
    meeting_id: Uuid,
    user_id: Uuid,
    present: bool,
    attendance_type: AttendanceType,
    recorded_by: Uuid,
) -> Result<AttendanceEntity, sqlx::Error> {
    let timer = QueryTimer::new("upsert_attendance");
    let result = sqlx::query_as::<_, AttendanceEntity>(
        r#"
        INSERT INTO meeting_attendance (meeting_id, user_id, present, attendance_type, recorded_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (meeting_id, user_id)
        DO UPDATE SET present = EXCLUDED.present,
                      attendance_type = EXCLUDED.attendance_type,
                      recorded_by = EXCLUDED.recorded_by,
                      recorded_at = NOW()
        RETURNING meeting_id, user_id, present, attendance_type, recorded_by, recorded_at
        "#,
    )
    .bind(meeting_id)
    .bind(user_id)
    .bind(present)
    .bind(attendance_type)
    .bind(recorded_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn find_minutes(
    conn: &mut PgConnection,
    meeting_id: Uuid,
) -> Result<Option<MinutesEntity>, sqlx::Error> {
    sqlx::query_as::<_, MinutesEntity>(&format!(
        "SELECT {} FROM meeting_minutes WHERE meeting_id = $1 FOR UPDATE",
        MINUTES_COLUMNS
    ))
    .bind(meeting_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Write draft minutes. Approved minutes are not overwritten.
pub async fn upsert_minutes(
    conn: &mut PgConnection,
    meeting_id: Uuid,
    content: &str,
    written_by: Uuid,
) -> Result<Option<MinutesEntity>, sqlx::Error> {
    let timer = QueryTimer::new("upsert_minutes");
    let result = sqlx::query_as::<_, MinutesEntity>(&format!(
        r#"
        INSERT INTO meeting_minutes (meeting_id, content, written_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (meeting_id)
        DO UPDATE SET content = EXCLUDED.content,
                      written_by = EXCLUDED.written_by,
                      updated_at = NOW()
        WHERE meeting_minutes.status = 'draft'
        RETURNING {}
        "#,
        MINUTES_COLUMNS
    ))
    .bind(meeting_id)
    .bind(content)
    .bind(written_by)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn approve_minutes(
    conn: &mut PgConnection,
    meeting_id: Uuid,
    approved_by: Uuid,
) -> Result<MinutesEntity, sqlx::Error> {
    let timer = QueryTimer::new("approve_minutes");
    let result = sqlx::query_as::<_, MinutesEntity>(&format!(
        r#"
        UPDATE meeting_minutes
        SET status = $2, approved_by = $3, approved_at = NOW(), updated_at = NOW()
        WHERE meeting_id = $1
        RETURNING {}
        "#,
        MINUTES_COLUMNS
    ))
    .bind(meeting_id)
    .bind(MinutesStatus::Approved)
    .bind(approved_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}
