//! Group invitation repository.

use chrono::{DateTime, Utc};
use domain::models::group::MemberRole;
use domain::models::invitation::InvitationStatus;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::invitation::INVITATION_COLUMNS;
use crate::entities::{InvitationEntity, MemberRoleDb};
use crate::metrics::QueryTimer;

/// Input for a new invitation row.
#[derive(Debug, Clone)]
pub struct NewInvitation<'a> {
    pub group_id: Uuid,
    pub invited_by: Uuid,
    pub invitee_user_id: Uuid,
    pub email: Option<&'a str>,
    pub role: MemberRole,
    pub message: Option<&'a str>,
    pub token_hash: &'a str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct InvitationRepository {
    pool: PgPool,
}

impl InvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Unanswered, unexpired invitations addressed to a user.
    pub async fn list_pending_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InvitationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_pending_invitations");
        let result = sqlx::query_as::<_, InvitationEntity>(&format!(
            r#"
            SELECT {} FROM invitations
            WHERE invitee_user_id = $1 AND status = 'pending' AND expires_at > NOW()
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            INVITATION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_pending_for_user(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_pending_invitations");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM invitations
            WHERE invitee_user_id = $1 AND status = 'pending' AND expires_at > NOW()
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}

/// Insert an invitation. A previous pending invitation to the same user
/// that has lapsed is closed first so the partial unique index admits the new one.
pub async fn insert_invitation(
    conn: &mut PgConnection,
    invitation: &NewInvitation<'_>,
) -> Result<InvitationEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_invitation");
    sqlx::query(
        r#"
        UPDATE invitations
        SET status = 'declined', responded_at = NOW()
        WHERE group_id = $1 AND invitee_user_id = $2
          AND status = 'pending' AND expires_at <= NOW()
        "#,
    )
    .bind(invitation.group_id)
    .bind(invitation.invitee_user_id)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query_as::<_, InvitationEntity>(&format!(
        r#"
        INSERT INTO invitations (group_id, invited_by, invitee_user_id, email, role, message,
            token_hash, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        INVITATION_COLUMNS
    ))
    .bind(invitation.group_id)
    .bind(invitation.invited_by)
    .bind(invitation.invitee_user_id)
    .bind(invitation.email)
    .bind(MemberRoleDb::from(invitation.role))
    .bind(invitation.message)
    .bind(invitation.token_hash)
    .bind(invitation.expires_at)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn lock_invitation(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<InvitationEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_invitation");
    let result = sqlx::query_as::<_, InvitationEntity>(&format!(
        "SELECT {} FROM invitations WHERE id = $1 FOR UPDATE",
        INVITATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn close_invitation(
    conn: &mut PgConnection,
    id: Uuid,
    status: InvitationStatus,
) -> Result<InvitationEntity, sqlx::Error> {
    let timer = QueryTimer::new("close_invitation");
    let result = sqlx::query_as::<_, InvitationEntity>(&format!(
        r#"
        UPDATE invitations
        SET status = $2, responded_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        INVITATION_COLUMNS
    ))
    .bind(id)
    .bind(status)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}
