//! Notification feed models: stored notifications and derived feed items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of stored notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    GuaranteeRequest,
    GuaranteeResponse,
    LoanDecision,
    LoanDisbursed,
    Invitation,
    PayoutRound,
    DividendPaid,
    ContributionReceived,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationType::GuaranteeRequest => "guarantee_request",
            NotificationType::GuaranteeResponse => "guarantee_response",
            NotificationType::LoanDecision => "loan_decision",
            NotificationType::LoanDisbursed => "loan_disbursed",
            NotificationType::Invitation => "invitation",
            NotificationType::PayoutRound => "payout_round",
            NotificationType::DividendPaid => "dividend_paid",
            NotificationType::ContributionReceived => "contribution_received",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoredNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification to be written for one user.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// Source kind of a derived feed item; the prefix forms its stable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedKind {
    Invitation,
    Meeting,
    Loan,
    Guarantee,
    Welfare,
    Transaction,
    ChamaActivity,
    SupportUpdate,
    SupportNew,
}

impl DerivedKind {
    pub const ALL: [DerivedKind; 9] = [
        DerivedKind::Invitation,
        DerivedKind::Meeting,
        DerivedKind::Loan,
        DerivedKind::Guarantee,
        DerivedKind::Welfare,
        DerivedKind::Transaction,
        DerivedKind::ChamaActivity,
        DerivedKind::SupportUpdate,
        DerivedKind::SupportNew,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            DerivedKind::Invitation => "invitation_",
            DerivedKind::Meeting => "meeting_",
            DerivedKind::Loan => "loan_",
            DerivedKind::Guarantee => "guarantee_",
            DerivedKind::Welfare => "welfare_",
            DerivedKind::Transaction => "transaction_",
            DerivedKind::ChamaActivity => "chama_activity_",
            DerivedKind::SupportUpdate => "support_update_",
            DerivedKind::SupportNew => "support_new_",
        }
    }

    /// Stable id of the feed item derived from `source_id`.
    pub fn derived_id(self, source_id: Uuid) -> String {
        format!("{}{}", self.prefix(), source_id)
    }
}

/// What a notification id in a request addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationRef {
    Stored(Uuid),
    Derived { kind: DerivedKind, id: String },
}

/// Classifies an id: plain UUIDs are stored rows, prefixed UUIDs are derived items.
pub fn parse_notification_id(raw: &str) -> Option<NotificationRef> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Some(NotificationRef::Stored(id));
    }
    // Longest prefixes first so `support_update_` is not read as another kind.
    let mut kinds = DerivedKind::ALL;
    kinds.sort_by_key(|k| std::cmp::Reverse(k.prefix().len()));
    kinds.iter().find_map(|kind| {
        raw.strip_prefix(kind.prefix())
            .and_then(|rest| Uuid::parse_str(rest).ok())
            .map(|source| NotificationRef::Derived {
                kind: *kind,
                id: kind.derived_id(source),
            })
    })
}

/// One entry in the unified feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub is_derived: bool,
    pub created_at: DateTime<Utc>,
}

impl From<StoredNotification> for FeedItem {
    fn from(n: StoredNotification) -> Self {
        Self {
            id: n.id.to_string(),
            item_type: n.notification_type.to_string(),
            title: n.title,
            message: n.message,
            data: n.data,
            is_read: n.is_read,
            is_derived: false,
            created_at: n.created_at,
        }
    }
}

/// Sorts newest first; ties broken by id so pagination is stable.
pub fn sort_feed(items: &mut [FeedItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UnreadCount {
    pub unread: i64,
}
