//! Group invitation entity.

use chrono::{DateTime, Utc};
use domain::models::invitation::{Invitation, InvitationStatus};
use sqlx::FromRow;
use uuid::Uuid;

use super::group::MemberRoleDb;

#[derive(Debug, Clone, FromRow)]
pub struct InvitationEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub invited_by: Uuid,
    pub invitee_user_id: Uuid,
    pub email: Option<String>,
    pub role: MemberRoleDb,
    pub message: Option<String>,
    pub token_hash: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub(crate) const INVITATION_COLUMNS: &str = "id, group_id, invited_by, invitee_user_id, email, \
    role, message, token_hash, status, expires_at, responded_at, created_at";

impl From<InvitationEntity> for Invitation {
    fn from(entity: InvitationEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            invited_by: entity.invited_by,
            invitee_user_id: entity.invitee_user_id,
            email: entity.email,
            role: entity.role.into(),
            message: entity.message,
            status: entity.status,
            expires_at: entity.expires_at,
            responded_at: entity.responded_at,
            created_at: entity.created_at,
        }
    }
}
