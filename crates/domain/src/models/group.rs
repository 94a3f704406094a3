//! Group ("chama") and membership domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use shared::validation::validate_money;

/// Role within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Chairperson,
    Secretary,
    Treasurer,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Chairperson => "chairperson",
            MemberRole::Secretary => "secretary",
            MemberRole::Treasurer => "treasurer",
            MemberRole::Member => "member",
        }
    }

    /// Chairperson, secretary and treasurer are officers.
    pub fn is_officer(&self) -> bool {
        matches!(
            self,
            MemberRole::Chairperson | MemberRole::Secretary | MemberRole::Treasurer
        )
    }

    /// Loans, disbursements and operator-recorded payments need the purse holders.
    pub fn can_approve_loans(&self) -> bool {
        matches!(self, MemberRole::Chairperson | MemberRole::Treasurer)
    }

    /// Ending meetings and recording attendance for others.
    pub fn can_end_meeting(&self) -> bool {
        matches!(self, MemberRole::Chairperson | MemberRole::Secretary)
    }

    pub fn can_manage_roles(&self) -> bool {
        matches!(self, MemberRole::Chairperson)
    }

    pub fn can_approve_minutes(&self) -> bool {
        matches!(self, MemberRole::Chairperson)
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chairperson" => Ok(MemberRole::Chairperson),
            "secretary" => Ok(MemberRole::Secretary),
            "treasurer" => Ok(MemberRole::Treasurer),
            "member" => Ok(MemberRole::Member),
            _ => Err(format!("Invalid member role: {}", s)),
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "group_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupCategory {
    Chama,
    Contribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contribution_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContributionFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

/// A savings group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: GroupCategory,
    pub subtype: Option<String>,
    pub contribution_amount: Decimal,
    pub contribution_frequency: ContributionFrequency,
    pub target_amount: Option<Decimal>,
    pub payment_recipient_name: Option<String>,
    pub payment_recipient_account: Option<String>,
    pub is_public: bool,
    pub max_members: i32,
    pub member_count: i32,
    /// Mirror of the group wallet balance.
    pub total_funds: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Rotating-payout groups forbid anonymous contributions.
    pub fn is_rotating(&self) -> bool {
        self.subtype.as_deref() == Some(ROTATING_SUBTYPE)
    }
}

/// Subtype marking merry-go-round groups.
pub const ROTATING_SUBTYPE: &str = "merry_go_round";

/// A user's membership in a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Membership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub total_contributions: Decimal,
    pub last_contribution_at: Option<DateTime<Utc>>,
}

/// Request payload for creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateGroupRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub category: GroupCategory,

    #[validate(length(max = 50, message = "Subtype must be at most 50 characters"))]
    pub subtype: Option<String>,

    #[validate(custom(function = "validate_money"))]
    pub contribution_amount: Decimal,

    pub contribution_frequency: ContributionFrequency,

    #[validate(custom(function = "validate_money"))]
    pub target_amount: Option<Decimal>,

    #[validate(length(max = 100))]
    pub payment_recipient_name: Option<String>,

    #[validate(length(max = 50))]
    pub payment_recipient_account: Option<String>,

    #[serde(default)]
    pub is_public: bool,

    #[validate(range(min = 2, max = 500, message = "Max members must be between 2 and 500"))]
    pub max_members: Option<i32>,

    #[validate(regex(
        path = *CURRENCY_REGEX,
        message = "Currency must be a 3-letter ISO code"
    ))]
    pub currency: Option<String>,
}

lazy_static::lazy_static! {
    static ref CURRENCY_REGEX: regex::Regex = regex::Regex::new(r"^[A-Z]{3}$").unwrap();
}

/// Request to change a member's role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpdateMemberRoleRequest {
    pub role: MemberRole,
}

/// Group as listed for the caller, with their role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    pub category: GroupCategory,
    pub member_count: i32,
    pub total_funds: Decimal,
    pub currency: String,
    pub your_role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// Group detail including the caller's membership.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    /// Absent when a system admin views a group they do not belong to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_membership: Option<Membership>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_officer_roles() {
        assert!(MemberRole::Chairperson.is_officer());
        assert!(MemberRole::Secretary.is_officer());
        assert!(MemberRole::Treasurer.is_officer());
        assert!(!MemberRole::Member.is_officer());
    }

    #[test]
    fn test_loan_approvers() {
        assert!(MemberRole::Chairperson.can_approve_loans());
        assert!(MemberRole::Treasurer.can_approve_loans());
        assert!(!MemberRole::Secretary.can_approve_loans());
        assert!(!MemberRole::Member.can_approve_loans());
    }

    #[test]
    fn test_meeting_closers() {
        assert!(MemberRole::Chairperson.can_end_meeting());
        assert!(MemberRole::Secretary.can_end_meeting());
        assert!(!MemberRole::Treasurer.can_end_meeting());
        assert!(!MemberRole::Member.can_end_meeting());
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!(
            "Treasurer".parse::<MemberRole>().unwrap(),
            MemberRole::Treasurer
        );
        assert!("owner".parse::<MemberRole>().is_err());
        assert_eq!(MemberRole::Chairperson.to_string(), "chairperson");
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(
            serde_json::to_string(&MemberRole::Secretary).unwrap(),
            "\"secretary\""
        );
    }

    #[test]
    fn test_create_group_request_validation() {
        let request = CreateGroupRequest {
            name: "Umoja Savers".into(),
            description: None,
            category: GroupCategory::Chama,
            subtype: Some(ROTATING_SUBTYPE.into()),
            contribution_amount: dec!(500),
            contribution_frequency: ContributionFrequency::Monthly,
            target_amount: None,
            payment_recipient_name: None,
            payment_recipient_account: None,
            is_public: false,
            max_members: Some(20),
            currency: Some("KES".into()),
        };
        assert!(request.validate().is_ok());

        let lowercase_currency = CreateGroupRequest {
            currency: Some("kes".into()),
            ..request.clone()
        };
        assert!(lowercase_currency.validate().is_err());

        let bad = CreateGroupRequest {
            name: String::new(),
            contribution_amount: dec!(0),
            ..request
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("contribution_amount"));
    }
}
