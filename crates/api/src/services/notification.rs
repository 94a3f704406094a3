//! Unified notification feed.
//!
//! Stored notifications are merged with items derived on read from domain
//! tables. Derived items carry a stable `<kind prefix><source id>` id so a
//! reader can dismiss one with a tombstone. The source queries drop tombstoned
//! rows themselves. Nothing here writes domain state.

use chrono::{DateTime, Duration, Utc};
use domain::models::notification::{
    parse_notification_id, sort_feed, DerivedKind, FeedItem, NotificationRef, StoredNotification,
    UnreadCount,
};
use domain::{EngineError, EngineResult};
use persistence::entities::{
    GuaranteeSourceRow, InvitationSourceRow, LoanSourceRow, MeetingSourceRow,
    MemberJoinSourceRow, SupportSourceRow, TransactionSourceRow, WelfareSourceRow,
};
use persistence::repositories::NotificationRepository;
use serde_json::json;
use shared::pagination::PageParams;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;

/// Support tickets touched within this long after creation still read as new.
const SUPPORT_NEW_GRACE_SECS: i64 = 60;

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    config: Arc<Config>,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, config: Arc<Config>) -> Self {
        Self { repo, config }
    }

    /// Stored and derived items, newest first, one page.
    pub async fn feed(&self, user_id: Uuid, page: PageParams) -> EngineResult<(Vec<FeedItem>, i64)> {
        let now = Utc::now();
        let derived = self.derived_items(user_id, now).await?;

        // Enough stored rows to fill the page at any split between the two sources.
        let depth = page.offset.saturating_add(page.limit);
        let (stored, stored_total) = tokio::try_join!(
            self.repo.list_stored(user_id, depth),
            self.repo.count_stored(user_id),
        )?;

        let total = stored_total + derived.len() as i64;
        let mut items: Vec<FeedItem> = stored
            .into_iter()
            .map(StoredNotification::from)
            .map(FeedItem::from)
            .chain(derived)
            .collect();
        sort_feed(&mut items);

        Ok((page.slice(&items), total))
    }

    async fn derived_items(&self, user_id: Uuid, now: DateTime<Utc>) -> EngineResult<Vec<FeedItem>> {
        let limits = &self.config.limits;
        let since = now - Duration::days(limits.recent_activity_days);
        let upcoming_until = now + Duration::hours(limits.upcoming_meeting_window_hours);

        let (
            invitations,
            meetings,
            loans,
            guarantees,
            welfare,
            transactions,
            joins,
            support,
        ) = tokio::try_join!(
            self.repo.pending_invitations(user_id),
            self.repo.meetings(user_id, upcoming_until, since),
            self.repo.loans(user_id, since),
            self.repo.pending_guarantees(user_id),
            self.repo.welfare_requests(user_id, since),
            self.repo
                .large_transactions(user_id, limits.large_transaction_threshold, since),
            self.repo.member_joins(user_id, since),
            self.repo
                .support_tickets(user_id, since, Duration::seconds(SUPPORT_NEW_GRACE_SECS)),
        )?;

        let items: Vec<FeedItem> = invitations
            .iter()
            .map(invitation_item)
            .chain(meetings.iter().map(meeting_item))
            .chain(loans.iter().map(loan_item))
            .chain(guarantees.iter().map(guarantee_item))
            .chain(welfare.iter().map(welfare_item))
            .chain(transactions.iter().map(transaction_item))
            .chain(joins.iter().map(member_join_item))
            .chain(support.iter().map(support_item))
            .collect();

        debug!(user_id = %user_id, derived = items.len(), "Derived feed built");
        Ok(items)
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> EngineResult<()> {
        if self.repo.mark_read(user_id, id).await? {
            Ok(())
        } else {
            Err(EngineError::NotificationNotFound)
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> EngineResult<u64> {
        Ok(self.repo.mark_all_read(user_id).await?)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> EngineResult<UnreadCount> {
        Ok(UnreadCount {
            unread: self.repo.count_unread(user_id).await?,
        })
    }

    /// Deletes a stored row, or tombstones a derived item. Tombstoning the
    /// same item twice is fine.
    pub async fn delete(&self, user_id: Uuid, raw_id: &str) -> EngineResult<()> {
        match parse_notification_id(raw_id) {
            Some(NotificationRef::Stored(id)) => {
                if self.repo.delete_stored(user_id, id).await? {
                    Ok(())
                } else {
                    Err(EngineError::NotificationNotFound)
                }
            }
            Some(NotificationRef::Derived { id, .. }) => {
                self.repo.insert_tombstone(user_id, &id).await?;
                Ok(())
            }
            None => Err(EngineError::NotificationNotFound),
        }
    }

    /// Drops tombstones older than the recent-activity window whose source
    /// can no longer produce a feed item. Dismissed items stay dismissed.
    pub async fn prune_tombstones(&self) -> EngineResult<u64> {
        let cutoff = Utc::now() - Duration::days(self.config.limits.recent_activity_days);
        Ok(self.repo.prune_tombstones(cutoff).await?)
    }
}

fn derived(
    kind: DerivedKind,
    source_id: Uuid,
    item_type: &str,
    title: String,
    message: String,
    data: serde_json::Value,
    created_at: DateTime<Utc>,
) -> FeedItem {
    FeedItem {
        id: kind.derived_id(source_id),
        item_type: item_type.to_string(),
        title,
        message,
        data,
        is_read: false,
        is_derived: true,
        created_at,
    }
}

fn name_or<'a>(name: &'a Option<String>, fallback: &'a str) -> &'a str {
    name.as_deref().unwrap_or(fallback)
}

fn invitation_item(row: &InvitationSourceRow) -> FeedItem {
    derived(
        DerivedKind::Invitation,
        row.id,
        "invitation",
        "Group invitation".into(),
        format!(
            "{} invited you to join {}",
            name_or(&row.inviter_name, "A member"),
            row.group_name
        ),
        json!({ "invitation_id": row.id, "group_id": row.group_id }),
        row.created_at,
    )
}

fn meeting_item(row: &MeetingSourceRow) -> FeedItem {
    derived(
        DerivedKind::Meeting,
        row.id,
        "meeting",
        row.title.clone(),
        format!(
            "{} meeting on {}",
            row.group_name,
            row.scheduled_at.format("%Y-%m-%d %H:%M UTC")
        ),
        json!({
            "meeting_id": row.id,
            "group_id": row.group_id,
            "scheduled_at": row.scheduled_at,
        }),
        row.created_at,
    )
}

fn loan_item(row: &LoanSourceRow) -> FeedItem {
    derived(
        DerivedKind::Loan,
        row.id,
        "loan_update",
        "Loan update".into(),
        format!("Your loan of {} is now {}", row.amount, row.status.replace('_', " ")),
        json!({
            "loan_id": row.id,
            "group_id": row.group_id,
            "status": row.status,
            "amount": row.amount,
        }),
        row.updated_at,
    )
}

fn guarantee_item(row: &GuaranteeSourceRow) -> FeedItem {
    derived(
        DerivedKind::Guarantee,
        row.id,
        "guarantee_request",
        "Guarantor request".into(),
        format!(
            "{} asked you to guarantee {}",
            name_or(&row.borrower_name, "A member"),
            row.pledged_amount
        ),
        json!({ "guarantee_id": row.id, "loan_id": row.loan_id }),
        row.created_at,
    )
}

fn welfare_item(row: &WelfareSourceRow) -> FeedItem {
    derived(
        DerivedKind::Welfare,
        row.id,
        "welfare_request",
        "Welfare request".into(),
        format!(
            "{} requested {} from {}",
            name_or(&row.requester_name, "A member"),
            row.amount,
            row.group_name
        ),
        json!({ "welfare_id": row.id, "group_id": row.group_id, "status": row.status }),
        row.created_at,
    )
}

fn transaction_item(row: &TransactionSourceRow) -> FeedItem {
    let group = row.group_name.as_deref().unwrap_or("your group");
    derived(
        DerivedKind::Transaction,
        row.id,
        "transaction",
        "Large transaction".into(),
        format!(
            "{} made a {} of {} {} in {}",
            name_or(&row.initiator_name, "A member"),
            row.transaction_type.replace('_', " "),
            row.currency,
            row.amount,
            group
        ),
        json!({
            "transaction_id": row.id,
            "group_id": row.group_id,
            "type": row.transaction_type,
            "amount": row.amount,
        }),
        row.created_at,
    )
}

fn member_join_item(row: &MemberJoinSourceRow) -> FeedItem {
    derived(
        DerivedKind::ChamaActivity,
        row.id,
        "chama_activity",
        "New member".into(),
        format!(
            "{} joined {}",
            name_or(&row.member_name, "A new member"),
            row.group_name
        ),
        json!({ "membership_id": row.id, "group_id": row.group_id }),
        row.joined_at,
    )
}

fn support_item(row: &SupportSourceRow) -> FeedItem {
    let is_new = row.updated_at - row.created_at <= Duration::seconds(SUPPORT_NEW_GRACE_SECS);
    let (kind, item_type, title) = if is_new {
        (DerivedKind::SupportNew, "support_new", "Support ticket opened")
    } else {
        (DerivedKind::SupportUpdate, "support_update", "Support ticket updated")
    };
    derived(
        kind,
        row.id,
        item_type,
        title.into(),
        format!("{}: {}", row.subject, row.status.replace('_', " ")),
        json!({ "ticket_id": row.id, "status": row.status }),
        row.updated_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_loan_item_id_and_text() {
        let id = Uuid::new_v4();
        let row = LoanSourceRow {
            id,
            group_id: Uuid::new_v4(),
            borrower_id: Uuid::new_v4(),
            borrower_name: Some("Wanjiru".into()),
            amount: dec!(5000),
            status: "guarantors_approved".into(),
            updated_at: Utc::now(),
        };
        let item = loan_item(&row);
        assert_eq!(item.id, format!("loan_{}", id));
        assert!(item.is_derived);
        assert!(!item.is_read);
        assert_eq!(item.message, "Your loan of 5000 is now guarantors approved");
    }

    #[test]
    fn test_support_item_new_versus_update() {
        let now = Utc::now();
        let mut row = SupportSourceRow {
            id: Uuid::new_v4(),
            subject: "Cannot withdraw".into(),
            status: "open".into(),
            created_at: now,
            updated_at: now,
        };
        assert!(support_item(&row).id.starts_with("support_new_"));

        row.updated_at = now + Duration::hours(3);
        row.status = "in_progress".into();
        let item = support_item(&row);
        assert!(item.id.starts_with("support_update_"));
        assert_eq!(item.message, "Cannot withdraw: in progress");
    }

    #[test]
    fn test_member_join_is_chama_activity() {
        let row = MemberJoinSourceRow {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            group_name: "Umoja".into(),
            member_name: None,
            joined_at: Utc::now(),
        };
        let item = member_join_item(&row);
        assert!(item.id.starts_with("chama_activity_"));
        assert_eq!(item.message, "A new member joined Umoja");
    }

    #[test]
    fn test_derived_ids_round_trip_through_parser() {
        let row = InvitationSourceRow {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            group_name: "Umoja".into(),
            inviter_name: Some("Achieng".into()),
            created_at: Utc::now(),
        };
        let item = invitation_item(&row);
        assert_eq!(
            parse_notification_id(&item.id),
            Some(NotificationRef::Derived {
                kind: DerivedKind::Invitation,
                id: item.id.clone(),
            })
        );
    }
}
