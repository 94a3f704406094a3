//! Dividend and share holding entities.

use chrono::{DateTime, Utc};
use domain::models::dividend::{
    DividendDeclaration, DividendPayment, DividendStatus, DividendType, PaymentStatus,
    ShareHolding, ShareStatus,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct DeclarationEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub dividend_type: DividendType,
    pub total_amount: Decimal,
    pub per_share_amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub status: DividendStatus,
    pub declared_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const DECLARATION_COLUMNS: &str = "id, group_id, dividend_type, total_amount, \
    per_share_amount, payment_date, status, declared_by, approved_by, created_at, updated_at";

impl From<DeclarationEntity> for DividendDeclaration {
    fn from(entity: DeclarationEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            dividend_type: entity.dividend_type,
            total_amount: entity.total_amount,
            per_share_amount: entity.per_share_amount,
            payment_date: entity.payment_date,
            status: entity.status,
            declared_by: entity.declared_by,
            approved_by: entity.approved_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DividendPaymentEntity {
    pub id: Uuid,
    pub declaration_id: Uuid,
    pub member_id: Uuid,
    pub shares: i64,
    pub per_share_amount: Decimal,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub transaction_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub(crate) const PAYMENT_COLUMNS: &str = "id, declaration_id, member_id, shares, \
    per_share_amount, amount, status, transaction_id, paid_at, created_at";

impl From<DividendPaymentEntity> for DividendPayment {
    fn from(entity: DividendPaymentEntity) -> Self {
        Self {
            id: entity.id,
            declaration_id: entity.declaration_id,
            member_id: entity.member_id,
            shares: entity.shares,
            per_share_amount: entity.per_share_amount,
            amount: entity.amount,
            status: entity.status,
            transaction_id: entity.transaction_id,
            paid_at: entity.paid_at,
            created_at: entity.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ShareHoldingEntity {
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub shares_owned: i64,
    pub status: ShareStatus,
    pub updated_at: DateTime<Utc>,
}

impl From<ShareHoldingEntity> for ShareHolding {
    fn from(entity: ShareHoldingEntity) -> Self {
        Self {
            group_id: entity.group_id,
            member_id: entity.member_id,
            shares_owned: entity.shares_owned,
            status: entity.status,
            updated_at: entity.updated_at,
        }
    }
}
