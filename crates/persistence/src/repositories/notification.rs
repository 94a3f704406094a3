//! Stored notifications, derived-feed tombstones and feed source queries.
//!
//! The source queries only read domain tables. Windows are passed in by the
//! caller so the feed and the tombstone pruning job agree on them. Each source
//! drops the reader's tombstoned rows before `SOURCE_ROW_CAP` applies.

use chrono::{DateTime, Duration, Utc};
use domain::models::notification::NewNotification;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{
    GuaranteeSourceRow, InvitationSourceRow, LoanSourceRow, MeetingSourceRow,
    MemberJoinSourceRow, NotificationEntity, SupportSourceRow, TransactionSourceRow,
    WelfareSourceRow,
};
use crate::metrics::QueryTimer;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, title, message, data, is_read, created_at";

/// Upper bound on rows read from any single feed source.
pub const SOURCE_ROW_CAP: i64 = 200;

#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, notification: &NewNotification) -> Result<NotificationEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_notification");
        let result = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            INSERT INTO notifications (user_id, notification_type, title, message, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(notification.user_id)
        .bind(notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Newest stored notifications, enough to fill a page at the given depth.
    pub async fn list_stored(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<NotificationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_stored_notifications");
        let result = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            SELECT {} FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_stored(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_stored_notifications");
        let result =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await;
        timer.record();
        result
    }

    pub async fn count_unread(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_unread_notifications");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Returns false if the notification does not belong to the user.
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("mark_notification_read");
        let result = sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected() == 1)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("mark_all_notifications_read");
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    pub async fn delete_stored(&self, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_notification");
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected() == 1)
    }

    /// Hide a derived item from the user's feed. Repeating it is a no-op.
    pub async fn insert_tombstone(&self, user_id: Uuid, derived_id: &str) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_notification_tombstone");
        let result = sqlx::query(
            r#"
            INSERT INTO notification_tombstones (user_id, derived_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, derived_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(derived_id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Remove tombstones created before `since` whose source can no longer
    /// produce a feed item. A source that may still surface keeps its tombstone
    /// however old it is. Unknown prefixes are kept.
    pub async fn prune_tombstones(&self, since: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("prune_notification_tombstones");
        let result = sqlx::query(
            r#"
            WITH aged AS (
                SELECT user_id, derived_id,
                       substring(derived_id FROM '^[a-z_]+_') AS kind,
                       regexp_replace(derived_id, '^[a-z_]+_', '')::uuid AS source_id
                FROM notification_tombstones
                WHERE created_at < $1
            )
            DELETE FROM notification_tombstones nt
            USING aged a
            WHERE nt.user_id = a.user_id AND nt.derived_id = a.derived_id
              AND NOT CASE a.kind
                WHEN 'invitation_' THEN EXISTS (
                    SELECT 1 FROM invitations i
                    WHERE i.id = a.source_id AND i.status = 'pending' AND i.expires_at > NOW())
                WHEN 'meeting_' THEN EXISTS (
                    SELECT 1 FROM meetings mt
                    WHERE mt.id = a.source_id AND mt.status = 'scheduled')
                WHEN 'loan_' THEN EXISTS (
                    SELECT 1 FROM loans l
                    WHERE l.id = a.source_id
                      AND (l.updated_at >= $1 OR l.status NOT IN ('settled', 'rejected')))
                WHEN 'guarantee_' THEN EXISTS (
                    SELECT 1 FROM guarantees g
                    WHERE g.id = a.source_id AND g.status = 'pending')
                WHEN 'welfare_' THEN EXISTS (
                    SELECT 1 FROM welfare_requests w
                    WHERE w.id = a.source_id AND w.created_at >= $1)
                WHEN 'transaction_' THEN EXISTS (
                    SELECT 1 FROM transactions t
                    WHERE t.id = a.source_id AND t.created_at >= $1)
                WHEN 'chama_activity_' THEN EXISTS (
                    SELECT 1 FROM memberships m WHERE m.id = a.source_id)
                WHEN 'support_new_' THEN EXISTS (
                    SELECT 1 FROM support_tickets s WHERE s.id = a.source_id)
                WHEN 'support_update_' THEN EXISTS (
                    SELECT 1 FROM support_tickets s WHERE s.id = a.source_id)
                ELSE true
              END
            "#,
        )
        .bind(since)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    // Derived feed sources

    pub async fn pending_invitations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<InvitationSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_pending_invitations");
        let result = sqlx::query_as::<_, InvitationSourceRow>(
            r#"
            SELECT i.id, i.group_id, g.name AS group_name, u.display_name AS inviter_name,
                   i.created_at
            FROM invitations i
            JOIN groups g ON g.id = i.group_id
            LEFT JOIN users u ON u.id = i.invited_by
            WHERE i.invitee_user_id = $1 AND i.status = 'pending' AND i.expires_at > NOW()
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'invitation_' || i.id::text)
            ORDER BY i.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Meetings in the user's groups that are upcoming or were recently created.
    pub async fn meetings(
        &self,
        user_id: Uuid,
        upcoming_until: DateTime<Utc>,
        created_since: DateTime<Utc>,
    ) -> Result<Vec<MeetingSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_meetings");
        let result = sqlx::query_as::<_, MeetingSourceRow>(
            r#"
            SELECT mt.id, mt.group_id, g.name AS group_name, mt.title, mt.scheduled_at,
                   mt.created_at
            FROM meetings mt
            JOIN groups g ON g.id = mt.group_id
            JOIN memberships m ON m.group_id = mt.group_id AND m.user_id = $1 AND m.is_active
            WHERE mt.status = 'scheduled'
              AND ((mt.scheduled_at BETWEEN NOW() AND $2) OR mt.created_at >= $3)
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'meeting_' || mt.id::text)
            ORDER BY mt.created_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(upcoming_until)
        .bind(created_since)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// The user's own loans that changed recently.
    pub async fn loans(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoanSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_loans");
        let result = sqlx::query_as::<_, LoanSourceRow>(
            r#"
            SELECT l.id, l.group_id, l.borrower_id, u.display_name AS borrower_name, l.amount,
                   l.status::text AS status, l.updated_at
            FROM loans l
            LEFT JOIN users u ON u.id = l.borrower_id
            WHERE l.borrower_id = $1 AND l.updated_at >= $2
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'loan_' || l.id::text)
            ORDER BY l.updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Guarantee requests still waiting on the user.
    pub async fn pending_guarantees(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<GuaranteeSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_pending_guarantees");
        let result = sqlx::query_as::<_, GuaranteeSourceRow>(
            r#"
            SELECT gt.id, gt.loan_id, u.display_name AS borrower_name, gt.pledged_amount,
                   gt.created_at
            FROM guarantees gt
            JOIN loans l ON l.id = gt.loan_id
            LEFT JOIN users u ON u.id = l.borrower_id
            WHERE gt.guarantor_id = $1 AND gt.status = 'pending'
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'guarantee_' || gt.id::text)
            ORDER BY gt.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Welfare requests raised by other members of the user's groups.
    pub async fn welfare_requests(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<WelfareSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_welfare_requests");
        let result = sqlx::query_as::<_, WelfareSourceRow>(
            r#"
            SELECT w.id, w.group_id, g.name AS group_name, u.display_name AS requester_name,
                   w.amount, w.status, w.created_at
            FROM welfare_requests w
            JOIN groups g ON g.id = w.group_id
            JOIN memberships m ON m.group_id = w.group_id AND m.user_id = $1 AND m.is_active
            LEFT JOIN users u ON u.id = w.requester_id
            WHERE w.requester_id <> $1 AND w.created_at >= $2
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'welfare_' || w.id::text)
            ORDER BY w.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Completed group transactions at or above the threshold.
    pub async fn large_transactions(
        &self,
        user_id: Uuid,
        threshold: Decimal,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_large_transactions");
        let result = sqlx::query_as::<_, TransactionSourceRow>(
            r#"
            SELECT t.id, t.transaction_type::text AS transaction_type, t.amount, t.currency,
                   t.status::text AS status, t.initiator_id, u.display_name AS initiator_name,
                   t.group_id, g.name AS group_name, t.created_at
            FROM transactions t
            JOIN groups g ON g.id = t.group_id
            JOIN memberships m ON m.group_id = t.group_id AND m.user_id = $1 AND m.is_active
            LEFT JOIN users u ON u.id = t.initiator_id
            WHERE t.status = 'completed' AND t.amount >= $2 AND t.created_at >= $3
              AND COALESCE((t.metadata->>'is_anonymous')::boolean, false) = false
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'transaction_' || t.id::text)
            ORDER BY t.created_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(threshold)
        .bind(since)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Other members joining the user's groups.
    pub async fn member_joins(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<MemberJoinSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_member_joins");
        let result = sqlx::query_as::<_, MemberJoinSourceRow>(
            r#"
            SELECT other.id, other.group_id, g.name AS group_name,
                   u.display_name AS member_name, other.joined_at
            FROM memberships other
            JOIN groups g ON g.id = other.group_id
            JOIN memberships m ON m.group_id = other.group_id AND m.user_id = $1 AND m.is_active
            LEFT JOIN users u ON u.id = other.user_id
            WHERE other.user_id <> $1 AND other.is_active AND other.joined_at >= $2
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1 AND nt.derived_id = 'chama_activity_' || other.id::text)
            ORDER BY other.joined_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// The user's tickets touched recently. A ticket updated within `new_grace`
    /// of creation is still the `support_new_` item, later ones `support_update_`.
    pub async fn support_tickets(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        new_grace: Duration,
    ) -> Result<Vec<SupportSourceRow>, sqlx::Error> {
        let timer = QueryTimer::new("feed_support_tickets");
        let result = sqlx::query_as::<_, SupportSourceRow>(
            r#"
            SELECT s.id, s.subject, s.status, s.created_at, s.updated_at
            FROM support_tickets s
            WHERE s.user_id = $1 AND s.updated_at >= $2
              AND NOT EXISTS (
                  SELECT 1 FROM notification_tombstones nt
                  WHERE nt.user_id = $1
                    AND nt.derived_id = CASE
                        WHEN s.updated_at - s.created_at <= $3 THEN 'support_new_'
                        ELSE 'support_update_'
                    END || s.id::text)
            ORDER BY s.updated_at DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(new_grace)
        .bind(SOURCE_ROW_CAP)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
