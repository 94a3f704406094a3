//! Loan and guarantee entities.

use chrono::{DateTime, Utc};
use domain::models::loan::{Guarantee, GuaranteeStatus, Loan, LoanStatus};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct LoanEntity {
    pub id: Uuid,
    pub group_id: Uuid,
    pub borrower_id: Uuid,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub duration_months: i32,
    pub purpose: String,
    pub required_guarantors: i32,
    pub approved_guarantors: i32,
    pub status: LoanStatus,
    pub total_amount: Decimal,
    pub remaining_amount: Decimal,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const LOAN_COLUMNS: &str = "id, group_id, borrower_id, amount, interest_rate, \
    duration_months, purpose, required_guarantors, approved_guarantors, status, total_amount, \
    remaining_amount, approved_by, approved_at, rejection_reason, disbursed_at, due_date, \
    created_at, updated_at";

impl From<LoanEntity> for Loan {
    fn from(entity: LoanEntity) -> Self {
        Self {
            id: entity.id,
            group_id: entity.group_id,
            borrower_id: entity.borrower_id,
            amount: entity.amount,
            interest_rate: entity.interest_rate,
            duration_months: entity.duration_months,
            purpose: entity.purpose,
            required_guarantors: entity.required_guarantors,
            approved_guarantors: entity.approved_guarantors,
            status: entity.status,
            total_amount: entity.total_amount,
            remaining_amount: entity.remaining_amount,
            approved_by: entity.approved_by,
            approved_at: entity.approved_at,
            rejection_reason: entity.rejection_reason,
            disbursed_at: entity.disbursed_at,
            due_date: entity.due_date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GuaranteeEntity {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub guarantor_id: Uuid,
    pub pledged_amount: Decimal,
    pub status: GuaranteeStatus,
    pub response_note: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub(crate) const GUARANTEE_COLUMNS: &str =
    "id, loan_id, guarantor_id, pledged_amount, status, response_note, responded_at, created_at";

impl From<GuaranteeEntity> for Guarantee {
    fn from(entity: GuaranteeEntity) -> Self {
        Self {
            id: entity.id,
            loan_id: entity.loan_id,
            guarantor_id: entity.guarantor_id,
            pledged_amount: entity.pledged_amount,
            status: entity.status,
            response_note: entity.response_note,
            responded_at: entity.responded_at,
            created_at: entity.created_at,
        }
    }
}
