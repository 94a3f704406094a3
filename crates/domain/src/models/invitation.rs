//! Group invitation models.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::group::MemberRole;
use crate::error::{EngineError, EngineResult};

/// Days before an unanswered invitation lapses.
pub const INVITATION_TTL_DAYS: i64 = 14;

const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invitation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationAction {
    Accept,
    Decline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Invitation {
    pub id: Uuid,
    pub group_id: Uuid,
    pub invited_by: Uuid,
    pub invitee_user_id: Uuid,
    pub email: Option<String>,
    pub role: MemberRole,
    pub message: Option<String>,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Only pending, unexpired invitations can be answered.
    pub fn check_respondable(&self, now: DateTime<Utc>) -> EngineResult<()> {
        if self.status != InvitationStatus::Pending {
            return Err(EngineError::AlreadyResponded);
        }
        if self.is_expired(now) {
            return Err(EngineError::Validation("Invitation has expired".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SendInvitationRequest {
    pub invitee_user_id: Uuid,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// Defaults to member.
    pub role: Option<MemberRole>,

    #[validate(length(max = 500))]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RespondInvitationRequest {
    pub action: InvitationAction,
}

/// Random token embedded in the invitation email link; only its hash is stored.
pub fn generate_invitation_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            invited_by: Uuid::new_v4(),
            invitee_user_id: Uuid::new_v4(),
            email: None,
            role: MemberRole::Member,
            message: None,
            status,
            expires_at: now + expires_in,
            responded_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_pending_invitation_is_respondable() {
        let inv = invitation(InvitationStatus::Pending, Duration::days(1));
        assert!(inv.check_respondable(Utc::now()).is_ok());
    }

    #[test]
    fn test_answered_invitation_is_not_respondable() {
        let inv = invitation(InvitationStatus::Accepted, Duration::days(1));
        assert!(matches!(
            inv.check_respondable(Utc::now()),
            Err(EngineError::AlreadyResponded)
        ));
    }

    #[test]
    fn test_expired_invitation_is_not_respondable() {
        let inv = invitation(InvitationStatus::Pending, Duration::seconds(-1));
        assert!(matches!(
            inv.check_respondable(Utc::now()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_token_shape() {
        let a = generate_invitation_token();
        let b = generate_invitation_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
