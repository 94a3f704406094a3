//! Notification entities: stored rows and derived feed source rows.

use chrono::{DateTime, Utc};
use domain::models::notification::{NotificationType, StoredNotification};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct NotificationEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationEntity> for StoredNotification {
    fn from(entity: NotificationEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            notification_type: entity.notification_type,
            title: entity.title,
            message: entity.message,
            data: entity.data,
            is_read: entity.is_read,
            created_at: entity.created_at,
        }
    }
}

/// Pending invitation addressed to the reader.
#[derive(Debug, Clone, FromRow)]
pub struct InvitationSourceRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub inviter_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Upcoming meeting in one of the reader's groups.
#[derive(Debug, Clone, FromRow)]
pub struct MeetingSourceRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Loan row relevant to the reader (as borrower or pending guarantor).
#[derive(Debug, Clone, FromRow)]
pub struct LoanSourceRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub borrower_id: Uuid,
    pub borrower_name: Option<String>,
    pub amount: Decimal,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

/// Pending guarantee request addressed to the reader.
#[derive(Debug, Clone, FromRow)]
pub struct GuaranteeSourceRow {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub borrower_name: Option<String>,
    pub pledged_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Someone else joining one of the reader's groups.
#[derive(Debug, Clone, FromRow)]
pub struct MemberJoinSourceRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub member_name: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WelfareSourceRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub requester_name: Option<String>,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry touching the reader, or group activity by another member.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionSourceRow {
    pub id: Uuid,
    pub transaction_type: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub initiator_id: Uuid,
    pub initiator_name: Option<String>,
    pub group_id: Option<Uuid>,
    pub group_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SupportSourceRow {
    pub id: Uuid,
    pub subject: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
