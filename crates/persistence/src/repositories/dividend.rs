//! Share holding and dividend repository.

use chrono::{DateTime, Utc};
use domain::models::dividend::{DividendStatus, DividendType, ShareStatus};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::dividend::{DECLARATION_COLUMNS, PAYMENT_COLUMNS};
use crate::entities::{DeclarationEntity, DividendPaymentEntity, ShareHoldingEntity};
use crate::metrics::QueryTimer;

const HOLDING_COLUMNS: &str = "group_id, member_id, shares_owned, status, updated_at";

#[derive(Clone)]
pub struct DividendRepository {
    pool: PgPool,
}

impl DividendRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_declaration(
        &self,
        id: Uuid,
    ) -> Result<Option<DeclarationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_dividend_declaration");
        let result = sqlx::query_as::<_, DeclarationEntity>(&format!(
            "SELECT {} FROM dividend_declarations WHERE id = $1",
            DECLARATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_payments(
        &self,
        declaration_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DividendPaymentEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_dividend_payments");
        let result = sqlx::query_as::<_, DividendPaymentEntity>(&format!(
            r#"
            SELECT {} FROM dividend_payments
            WHERE declaration_id = $1
            ORDER BY created_at, member_id
            LIMIT $2 OFFSET $3
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(declaration_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_payments(&self, declaration_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_dividend_payments");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM dividend_payments WHERE declaration_id = $1",
        )
        .bind(declaration_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}

pub async fn upsert_holding(
    conn: &mut PgConnection,
    group_id: Uuid,
    member_id: Uuid,
    shares_owned: i64,
    status: ShareStatus,
) -> Result<ShareHoldingEntity, sqlx::Error> {
    let timer = QueryTimer::new("upsert_share_holding");
    let result = sqlx::query_as::<_, ShareHoldingEntity>(&format!(
        r#"
        INSERT INTO share_holdings (group_id, member_id, shares_owned, status)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (group_id, member_id)
        DO UPDATE SET shares_owned = EXCLUDED.shares_owned,
                      status = EXCLUDED.status,
                      updated_at = NOW()
        RETURNING {}
        "#,
        HOLDING_COLUMNS
    ))
    .bind(group_id)
    .bind(member_id)
    .bind(shares_owned)
    .bind(status)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn group_holdings(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Vec<ShareHoldingEntity>, sqlx::Error> {
    let timer = QueryTimer::new("group_share_holdings");
    let result = sqlx::query_as::<_, ShareHoldingEntity>(&format!(
        "SELECT {} FROM share_holdings WHERE group_id = $1 ORDER BY member_id",
        HOLDING_COLUMNS
    ))
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await;
    timer.record();
    result
}

/// Active shares outstanding in a group.
pub async fn total_active_shares(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COALESCE(SUM(shares_owned), 0)::bigint
        FROM share_holdings
        WHERE group_id = $1 AND status = 'active'
        "#,
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_declaration(
    conn: &mut PgConnection,
    group_id: Uuid,
    dividend_type: DividendType,
    total_amount: Decimal,
    per_share_amount: Decimal,
    payment_date: DateTime<Utc>,
    declared_by: Uuid,
) -> Result<DeclarationEntity, sqlx::Error> {
    let timer = QueryTimer::new("insert_dividend_declaration");
    let result = sqlx::query_as::<_, DeclarationEntity>(&format!(
        r#"
        INSERT INTO dividend_declarations (group_id, dividend_type, total_amount,
            per_share_amount, payment_date, declared_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        DECLARATION_COLUMNS
    ))
    .bind(group_id)
    .bind(dividend_type)
    .bind(total_amount)
    .bind(per_share_amount)
    .bind(payment_date)
    .bind(declared_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn lock_declaration(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<DeclarationEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_dividend_declaration");
    let result = sqlx::query_as::<_, DeclarationEntity>(&format!(
        "SELECT {} FROM dividend_declarations WHERE id = $1 FOR UPDATE",
        DECLARATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn set_declaration_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: DividendStatus,
    approved_by: Option<Uuid>,
) -> Result<DeclarationEntity, sqlx::Error> {
    let timer = QueryTimer::new("set_dividend_status");
    let result = sqlx::query_as::<_, DeclarationEntity>(&format!(
        r#"
        UPDATE dividend_declarations
        SET status = $2, approved_by = COALESCE($3, approved_by), updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        DECLARATION_COLUMNS
    ))
    .bind(id)
    .bind(status)
    .bind(approved_by)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Insert a pending payment; an existing row for the member is left as is.
pub async fn upsert_payment(
    conn: &mut PgConnection,
    declaration_id: Uuid,
    member_id: Uuid,
    shares: i64,
    per_share_amount: Decimal,
    amount: Decimal,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO dividend_payments (declaration_id, member_id, shares, per_share_amount, amount)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (declaration_id, member_id) DO NOTHING
        "#,
    )
    .bind(declaration_id)
    .bind(member_id)
    .bind(shares)
    .bind(per_share_amount)
    .bind(amount)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Pending payments of a declaration, locked.
pub async fn lock_pending_payments(
    conn: &mut PgConnection,
    declaration_id: Uuid,
) -> Result<Vec<DividendPaymentEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_pending_dividend_payments");
    let result = sqlx::query_as::<_, DividendPaymentEntity>(&format!(
        r#"
        SELECT {} FROM dividend_payments
        WHERE declaration_id = $1 AND status = 'pending'
        ORDER BY member_id
        FOR UPDATE
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(declaration_id)
    .fetch_all(&mut *conn)
    .await;
    timer.record();
    result
}

pub async fn mark_payment_paid(
    conn: &mut PgConnection,
    id: Uuid,
    transaction_id: Uuid,
) -> Result<DividendPaymentEntity, sqlx::Error> {
    sqlx::query_as::<_, DividendPaymentEntity>(&format!(
        r#"
        UPDATE dividend_payments
        SET status = 'paid', transaction_id = $2, paid_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        PAYMENT_COLUMNS
    ))
    .bind(id)
    .bind(transaction_id)
    .fetch_one(&mut *conn)
    .await
}
