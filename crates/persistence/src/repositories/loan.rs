//! Loan and guarantee repository.

use chrono::{DateTime, Utc};
use domain::models::loan::{GuaranteeStatus, LoanStatus};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::loan::{GUARANTEE_COLUMNS, LOAN_COLUMNS};
use crate::entities::{GuaranteeEntity, LoanEntity};
use crate::metrics::QueryTimer;

/// Input for a new loan row.
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub group_id: Uuid,
    pub borrower_id: Uuid,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub duration_months: i32,
    pub purpose: String,
    pub required_guarantors: i32,
    pub total_amount: Decimal,
    pub due_date: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LoanRepository {
    pool: PgPool,
}

impl LoanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LoanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_loan_by_id");
        let result = sqlx::query_as::<_, LoanEntity>(&format!(
            "SELECT {} FROM loans WHERE id = $1",
            LOAN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_guarantees(&self, loan_id: Uuid) -> Result<Vec<GuaranteeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_guarantees");
        let result = sqlx::query_as::<_, GuaranteeEntity>(&format!(
            "SELECT {} FROM guarantees WHERE loan_id = $1 ORDER BY created_at, id",
            GUARANTEE_COLUMNS
        ))
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_group_loans(
        &self,
        group_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LoanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_group_loans");
        let result = sqlx::query_as::<_, LoanEntity>(&format!(
            r#"
            SELECT {} FROM loans
            WHERE group_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            LOAN_COLUMNS
        ))
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_group_loans(&self, group_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_group_loans");
        let result = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM loans WHERE group_id = $1")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }
}

pub async fn insert_loan(conn: &mut PgConnection, loan: &NewLoan) -> Result<LoanEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_loan");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        r#"
        INSERT INTO loans (group_id, borrower_id, amount, interest_rate, duration_months,
            purpose, required_guarantors, total_amount, remaining_amount, due_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9)
        RETURNING {}
        "#,
        LOAN_COLUMNS
    ))
    .bind(loan.group_id)
    .bind(loan.borrower_id)
    .bind(loan.amount)
    .bind(loan.interest_rate)
    .bind(loan.duration_months)
    .bind(&loan.purpose)
    .bind(loan.required_guarantors)
    .bind(loan.total_amount)
    .bind(loan.due_date)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn insert_guarantee(
    conn: &mut PgConnection,
    loan_id: Uuid,
    guarantor_id: Uuid,
    pledged_amount: Decimal,
) -> Result<GuaranteeEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_guarantee");
    let result = sqlx::query_as::<_, GuaranteeEntity>(&format!(
        r#"
        INSERT INTO guarantees (loan_id, guarantor_id, pledged_amount)
        VALUES ($1, $2, $3)
        RETURNING {}
        "#,
        GUARANTEE_COLUMNS
    ))
    .bind(loan_id)
    .bind(guarantor_id)
    .bind(pledged_amount)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Load a loan and lock its row.
pub async fn lock_loan(conn: &mut PgConnection, id: Uuid) -> Result<Option<LoanEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_loan");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
        LOAN_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn find_guarantee(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<GuaranteeEntity>, sqlx::Error> {
    let timer = QueryTimer::new("find_guarantee");
    let result = sqlx::query_as::<_, GuaranteeEntity>(&format!(
        "SELECT {} FROM guarantees WHERE id = $1",
        GUARANTEE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

/// Move a pending guarantee to a terminal state. Returns `None` if it was not pending.
pub async fn respond_guarantee(
    conn: &mut PgConnection,
    id: Uuid,
    status: GuaranteeStatus,
    note: Option<&str>,
) -> Result<Option<GuaranteeEntity>, sqlx::Error> {
    let timer = QueryTimer::new("respond_guarantee");
    let result = sqlx::query_as::<_, GuaranteeEntity>(&format!(
        r#"
        UPDATE guarantees
        SET status = $2, response_note = $3, responded_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING {}
        "#,
        GUARANTEE_COLUMNS
    ))
    .bind(id)
    .bind(status)
    .bind(note)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn guarantee_statuses(
    conn: &mut PgConnection,
    loan_id: Uuid,
) -> Result<Vec<GuaranteeStatus>, sqlx::Error> {
    let timer = QueryTimer::new("guarantee_statuses");
    let result = sqlx::query_scalar::<_, GuaranteeStatus>(
        "SELECT status FROM guarantees WHERE loan_id = $1",
    )
    .bind(loan_id)
    .fetch_all(&mut *conn)
    .await;
    timer.record();
    result
}

/// Store the guarantor tally and the loan status derived from it.
pub async fn update_guarantor_tally(
    conn: &mut PgConnection,
    id: Uuid,
    approved_guarantors: i32,
    status: LoanStatus,
) -> Result<LoanEntity, sqlx::Error> {
    let timer = QueryTimer::new("update_guarantor_tally");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        r#"
        UPDATE loans
        SET approved_guarantors = $2, status = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        LOAN_COLUMNS
    ))
    .bind(id)
    .bind(approved_guarantors)
    .bind(status)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn mark_approved(
    conn: &mut PgConnection,
    id: Uuid,
    approver: Uuid,
) -> Result<LoanEntity, sqlx::Error> {
    let timer = QueryTimer::new("approve_loan");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        r#"
        UPDATE loans
        SET status = 'approved', approved_by = $2, approved_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        LOAN_COLUMNS
    ))
    .bind(id)
    .bind(approver)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn mark_rejected(
    conn: &mut PgConnection,
    id: Uuid,
    approver: Uuid,
    reason: &str,
) -> Result<LoanEntity, sqlx::Error> {
    let timer = QueryTimer::new("reject_loan");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        r#"
        UPDATE loans
        SET status = 'rejected', approved_by = $2, rejection_reason = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        LOAN_COLUMNS
    ))
    .bind(id)
    .bind(approver)
    .bind(reason)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn mark_disbursed(conn: &mut PgConnection, id: Uuid) -> Result<LoanEntity, sqlx::Error> {
    let timer = QueryTimer::new("disburse_loan");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        r#"
        UPDATE loans
        SET status = 'disbursed', disbursed_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        LOAN_COLUMNS
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn apply_repayment(
    conn: &mut PgConnection,
    id: Uuid,
    remaining_amount: Decimal,
    status: LoanStatus,
) -> Result<LoanEntity, sqlx::Error> {
    let timer = QueryTimer::new("apply_loan_repayment");
    let result = sqlx::query_as::<_, LoanEntity>(&format!(
        r#"
        UPDATE loans
        SET remaining_amount = $2, status = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        LOAN_COLUMNS
    ))
    .bind(id)
    .bind(remaining_amount)
    .bind(status)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}
