//! Meeting lifecycle, attendance and minutes.

use domain::models::group::Membership;
use domain::models::meeting::{
    check_can_end, CreateMeetingRequest, MarkAttendanceRequest, Meeting, MeetingAttendance,
    MeetingMinutes, MeetingStatus, MinutesStatus, WriteMinutesRequest,
};
use domain::services::{
    authorization, CalendarEvent, CalendarService, CollaboratorResult, RoomIdGenerator,
};
use domain::{EngineError, EngineResult};
use persistence::repositories::meeting as meeting_repo;
use persistence::repositories::MeetingRepository;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::engine::{active_group, membership, EngineContext};

const DEFAULT_DURATION_MINUTES: i32 = 60;

#[derive(Clone)]
pub struct MeetingService {
    ctx: EngineContext,
    meetings: MeetingRepository,
    calendar: Arc<dyn CalendarService>,
    rooms: Arc<dyn RoomIdGenerator>,
}

impl MeetingService {
    pub fn new(
        ctx: EngineContext,
        calendar: Arc<dyn CalendarService>,
        rooms: Arc<dyn RoomIdGenerator>,
    ) -> Self {
        Self {
            meetings: MeetingRepository::new(ctx.pool.clone()),
            ctx,
            calendar,
            rooms,
        }
    }

    /// Schedules a meeting. Virtual and hybrid meetings get a room id; the
    /// calendar event is created after commit and its id stored separately.
    pub async fn create(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: CreateMeetingRequest,
    ) -> EngineResult<Meeting> {
        request.validate()?;

        let meeting = self
            .ctx
            .run(|| self.create_once(group_id, user_id, &request))
            .await?;

        info!(
            group_id = %group_id,
            meeting_id = %meeting.id,
            user_id = %user_id,
            meeting_type = ?meeting.meeting_type,
            scheduled_at = %meeting.scheduled_at,
            "Meeting scheduled"
        );
        Ok(meeting)
    }

    async fn create_once(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: &CreateMeetingRequest,
    ) -> EngineResult<Meeting> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        authorization::require_officer(caller.as_ref())?;

        let room_id = request
            .meeting_type
            .needs_room()
            .then(|| self.rooms.room_id(group_id));
        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);

        let meeting = Meeting::from(
            meeting_repo::insert_meeting(
                conn,
                group_id,
                request,
                duration,
                room_id.as_deref(),
                user_id,
            )
            .await?,
        );

        let join_url = meeting
            .room_id
            .as_deref()
            .map(|room| self.ctx.config.videoconference.room_url(room));
        let description = match (&meeting.description, &join_url) {
            (Some(text), Some(url)) => Some(format!("{}\n\nJoin: {}", text, url)),
            (None, Some(url)) => Some(format!("Join: {}", url)),
            (text, None) => text.clone(),
        };
        let event = CalendarEvent {
            source_id: meeting.id,
            group_id,
            title: meeting.title.clone(),
            description,
            starts_at: meeting.scheduled_at,
            duration_minutes: meeting.duration_minutes,
            location: meeting.location.clone().or(join_url),
        };
        let calendar = self.calendar.clone();
        let meetings = self.meetings.clone();
        uow.after_commit("calendar_event", async move {
            match calendar.create_event(&event).await {
                CollaboratorResult::Done(event_id) => meetings
                    .set_calendar_event(event.source_id, &event_id)
                    .await
                    .map_err(|e| e.to_string()),
                CollaboratorResult::Skipped => {
                    debug!(meeting_id = %event.source_id, "Calendar event skipped");
                    Ok(())
                }
                CollaboratorResult::Failed(reason) => Err(reason),
            }
        });

        self.ctx.commit(uow).await?;
        Ok(meeting)
    }

    /// `scheduled` to `active`, any officer.
    pub async fn start(&self, meeting_id: Uuid, user_id: Uuid) -> EngineResult<Meeting> {
        let meeting = self
            .ctx
            .run(|| {
                self.transition_once(
                    meeting_id,
                    user_id,
                    MeetingStatus::Active,
                    authorization::require_officer,
                )
            })
            .await?;
        info!(meeting_id = %meeting.id, user_id = %user_id, "Meeting started");
        Ok(meeting)
    }

    /// `active` to `ended`. Needs a closer and at least one attendance row.
    pub async fn end(&self, meeting_id: Uuid, user_id: Uuid) -> EngineResult<Meeting> {
        let meeting = self
            .ctx
            .run(|| {
                self.transition_once(
                    meeting_id,
                    user_id,
                    MeetingStatus::Ended,
                    authorization::require_meeting_closer,
                )
            })
            .await?;
        info!(meeting_id = %meeting.id, user_id = %user_id, "Meeting ended");
        Ok(meeting)
    }

    /// `scheduled` to `cancelled`, any officer.
    pub async fn cancel(&self, meeting_id: Uuid, user_id: Uuid) -> EngineResult<Meeting> {
        let meeting = self
            .ctx
            .run(|| {
                self.transition_once(
                    meeting_id,
                    user_id,
                    MeetingStatus::Cancelled,
                    authorization::require_officer,
                )
            })
            .await?;
        info!(meeting_id = %meeting.id, user_id = %user_id, "Meeting cancelled");
        Ok(meeting)
    }

    async fn transition_once(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        next: MeetingStatus,
        authorize: for<'a> fn(Option<&'a Membership>) -> EngineResult<&'a Membership>,
    ) -> EngineResult<Meeting> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let meeting = lock_meeting(conn, meeting_id).await?;
        let caller = membership(conn, meeting.group_id, user_id).await?;
        authorize(caller.as_ref())?;

        if next == MeetingStatus::Ended {
            let rows = meeting_repo::count_attendance(conn, meeting.id).await?;
            check_can_end(meeting.status, rows)?;
        } else {
            meeting.status.transition(next)?;
        }

        let meeting = Meeting::from(meeting_repo::set_status(conn, meeting.id, next).await?);
        self.ctx.commit(uow).await?;
        Ok(meeting)
    }

    /// Marks attendance for the caller, or for another member when the caller
    /// can close meetings.
    pub async fn mark_attendance(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        request: MarkAttendanceRequest,
    ) -> EngineResult<MeetingAttendance> {
        request.validate()?;
        let attendee = request.user_id.unwrap_or(user_id);

        let row = self
            .ctx
            .run(|| self.attendance_once(meeting_id, user_id, attendee, &request))
            .await?;
        info!(
            meeting_id = %meeting_id,
            attendee = %attendee,
            recorded_by = %user_id,
            present = row.present,
            "Attendance recorded"
        );
        Ok(row)
    }

    async fn attendance_once(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        attendee: Uuid,
        request: &MarkAttendanceRequest,
    ) -> EngineResult<MeetingAttendance> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let meeting = lock_meeting(conn, meeting_id).await?;
        let caller = membership(conn, meeting.group_id, user_id).await?;
        let caller = authorization::require_active_member(caller.as_ref())?;
        if !authorization::can_record_attendance_for(caller, attendee) {
            return Err(EngineError::InsufficientRole(
                "chairperson or secretary role required to record others".into(),
            ));
        }
        if attendee != user_id {
            let member = membership(conn, meeting.group_id, attendee).await?;
            authorization::require_active_member(member.as_ref())?;
        }
        if !matches!(meeting.status, MeetingStatus::Scheduled | MeetingStatus::Active) {
            return Err(EngineError::InvalidTransition {
                from: meeting.status.as_str().to_string(),
                to: "attendance".to_string(),
            });
        }

        let row = meeting_repo::upsert_attendance(
            conn,
            meeting.id,
            attendee,
            request.present,
            request.attendance_type,
            user_id,
        )
        .await?;
        self.ctx.commit(uow).await?;
        Ok(MeetingAttendance::from(row))
    }

    /// Draft minutes for an ended meeting. Secretary or chairperson.
    pub async fn write_minutes(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        request: WriteMinutesRequest,
    ) -> EngineResult<MeetingMinutes> {
        request.validate()?;

        let minutes = self
            .ctx
            .run(|| self.write_minutes_once(meeting_id, user_id, &request.content))
            .await?;

        info!(meeting_id = %meeting_id, user_id = %user_id, "Meeting minutes saved");
        Ok(minutes)
    }

    async fn write_minutes_once(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> EngineResult<MeetingMinutes> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let meeting = ended_meeting(conn, meeting_id).await?;
        let caller = membership(conn, meeting.group_id, user_id).await?;
        authorization::require_meeting_closer(caller.as_ref())?;

        // Approved minutes are frozen; the upsert returns nothing for them.
        let row = meeting_repo::upsert_minutes(conn, meeting.id, content, user_id)
            .await?
            .ok_or_else(|| EngineError::InvalidTransition {
                from: MinutesStatus::Approved.as_str().to_string(),
                to: MinutesStatus::Draft.as_str().to_string(),
            })?;
        self.ctx.commit(uow).await?;
        Ok(MeetingMinutes::from(row))
    }

    /// Chairperson approves the draft minutes of an ended meeting.
    pub async fn approve_minutes(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<MeetingMinutes> {
        let minutes = self
            .ctx
            .run(|| self.approve_minutes_once(meeting_id, user_id))
            .await?;

        info!(meeting_id = %meeting_id, user_id = %user_id, "Meeting minutes approved");
        Ok(minutes)
    }

    async fn approve_minutes_once(
        &self,
        meeting_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<MeetingMinutes> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let meeting = ended_meeting(conn, meeting_id).await?;
        let caller = membership(conn, meeting.group_id, user_id).await?;
        authorization::require_chairperson(caller.as_ref())?;

        let draft = meeting_repo::find_minutes(conn, meeting.id)
            .await?
            .map(MeetingMinutes::from)
            .ok_or_else(|| EngineError::MissingRequiredField("minutes".into()))?;
        if draft.status != MinutesStatus::Draft {
            return Err(EngineError::InvalidTransition {
                from: draft.status.as_str().to_string(),
                to: MinutesStatus::Approved.as_str().to_string(),
            });
        }

        let row = meeting_repo::approve_minutes(conn, meeting.id, user_id).await?;
        self.ctx.commit(uow).await?;
        Ok(MeetingMinutes::from(row))
    }
}

async fn lock_meeting(conn: &mut PgConnection, meeting_id: Uuid) -> EngineResult<Meeting> {
    meeting_repo::lock_meeting(conn, meeting_id)
        .await?
        .map(Meeting::from)
        .ok_or(EngineError::MeetingNotFound)
}

async fn ended_meeting(conn: &mut PgConnection, meeting_id: Uuid) -> EngineResult<Meeting> {
    let meeting = lock_meeting(conn, meeting_id).await?;
    if meeting.status != MeetingStatus::Ended {
        return Err(EngineError::Validation(
            "Minutes can only be written for ended meetings".into(),
        ));
    }
    Ok(meeting)
}
