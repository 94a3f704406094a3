//! Group and membership entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::group::{
    ContributionFrequency, Group, GroupCategory, GroupSummary, MemberRole, Membership,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for member_role that maps to PostgreSQL enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
pub enum MemberRoleDb {
    Chairperson,
    Secretary,
    Treasurer,
    Member,
}

impl From<MemberRoleDb> for MemberRole {
    fn from(db_role: MemberRoleDb) -> Self {
        match db_role {
            MemberRoleDb::Chairperson => MemberRole::Chairperson,
            MemberRoleDb::Secretary => MemberRole::Secretary,
            MemberRoleDb::Treasurer => MemberRole::Treasurer,
            MemberRoleDb::Member => MemberRole::Member,
        }
    }
}

impl From<MemberRole> for MemberRoleDb {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Chairperson => MemberRoleDb::Chairperson,
            MemberRole::Secretary => MemberRoleDb::Secretary,
            MemberRole::Treasurer => MemberRoleDb::Treasurer,
            MemberRole::Member => MemberRoleDb::Member,
        }
    }
}

/// Database row mapping for the groups table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupEntity {
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
    pub total_funds: Decimal,
    pub currency: String,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const GROUP_COLUMNS: &str = "id, name, description, category, subtype, \
    contribution_amount, contribution_frequency, target_amount, payment_recipient_name, \
    payment_recipient_account, is_public, max_members, member_count, total_funds, currency, \
    is_active, created_by, created_at, updated_at";

impl From<GroupEntity> for Group {
    fn from(entity: GroupEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            description: entity.description,
            category: entity.category,
            subtype: entity.subtype,
            contribution_amount: entity.contribution_amount,
            contribution_frequency: entity.contribution_frequency,
            target_amount: entity.target_amount,
            payment_recipient_name: entity.payment_recipient_name,
            payment_recipient_account: entity.payment_recipient_account,
            is_public: entity.is_public,
            max_members: entity.max_members,
            member_count: entity.member_count,
            total_funds: entity.total_funds,
            currency: entity.currency,
            is_active: entity.is_active,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the memberships table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRoleDb,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub total_contributions: Decimal,
    pub last_contribution_at: Option<DateTime<Utc>>,
}

impl From<MembershipEntity> for Membership {
    fn from(entity: MembershipEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            user_id: entity.user_id,
            role: entity.role.into(),
            is_active: entity.is_active,
            joined_at: entity.joined_at,
            total_contributions: entity.total_contributions,
            last_contribution_at: entity.last_contribution_at,
        }
    }
}

/// Group row joined with the caller's membership.
#[derive(Debug, Clone, FromRow)]
pub struct GroupSummaryEntity {
    pub id: Uuid,
    pub name: String,
    pub category: GroupCategory,
    pub member_count: i32,
    pub total_funds: Decimal,
    pub currency: String,
    pub role: MemberRoleDb,
    pub joined_at: DateTime<Utc>,
}

impl From<GroupSummaryEntity> for GroupSummary {
    fn from(entity: GroupSummaryEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            category: entity.category,
            member_count: entity.member_count,
            total_funds: entity.total_funds,
            currency: entity.currency,
            your_role: entity.role.into(),
            joined_at: entity.joined_at,
        }
    }
}
