//! Wallet ledger primitives.
//!
//! Every mutating function here runs on a caller-supplied connection that is
//! already inside a transaction. Wallet rows must be locked with
//! [`lock_wallets`] before [`debit`] or [`credit`] touch them.

use domain::models::wallet::{NewLedgerEntry, Posting, TransactionStatus, WalletKind};
use domain::{EngineError, EngineResult};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::wallet::LEDGER_ENTRY_COLUMNS;
use crate::entities::{LedgerEntryEntity, WalletEntity};
use crate::metrics::QueryTimer;

const WALLET_COLUMNS: &str = "id, owner_id, kind, balance, currency, created_at, updated_at";

/// Read-side access to wallets and ledger entries.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_wallet(
        &self,
        owner_id: Uuid,
        kind: WalletKind,
    ) -> Result<Option<WalletEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_wallet");
        let result = sqlx::query_as::<_, WalletEntity>(&format!(
            "SELECT {} FROM wallets WHERE owner_id = $1 AND kind = $2",
            WALLET_COLUMNS
        ))
        .bind(owner_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Entries the user initiated or received, newest first.
    pub async fn list_user_entries(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_user_entries");
        let result = sqlx::query_as::<_, LedgerEntryEntity>(&format!(
            r#"
            SELECT {}
            FROM transactions
            WHERE initiator_id = $1 OR recipient_id = $1
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            LEDGER_ENTRY_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn count_user_entries(&self, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_user_entries");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE initiator_id = $1 OR recipient_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Most recent entries that posted against a wallet.
    pub async fn recent_wallet_entries(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("recent_wallet_entries");
        let result = sqlx::query_as::<_, LedgerEntryEntity>(&format!(
            r#"
            SELECT {}
            FROM transactions t
            WHERE EXISTS (
                SELECT 1 FROM ledger_postings p
                WHERE p.transaction_id = t.id AND p.wallet_id = $1
            )
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
            LEDGER_ENTRY_COLUMNS
        ))
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_ledger_entry");
        let result = sqlx::query_as::<_, LedgerEntryEntity>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            LEDGER_ENTRY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sum of posted deltas for a wallet; equals its balance when the ledger is consistent.
    pub async fn posting_total(&self, wallet_id: Uuid) -> Result<Decimal, sqlx::Error> {
        let timer = QueryTimer::new("posting_total");
        let result = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(delta), 0) FROM ledger_postings WHERE wallet_id = $1",
        )
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Sum of completed contributions by a member into a group.
    pub async fn completed_contribution_total(
        &self,
        group_id: Uuid,
        contributor_id: Uuid,
    ) -> Result<Decimal, sqlx::Error> {
        let timer = QueryTimer::new("completed_contribution_total");
        let result = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE transaction_type = 'contribution'
              AND status = 'completed'
              AND group_id = $1
              AND (metadata->>'contributor_id')::uuid = $2
            "#,
        )
        .bind(group_id)
        .bind(contributor_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}

/// Return the wallet for `(owner, kind)`, creating it with a zero balance if absent.
pub async fn ensure_wallet(
    conn: &mut PgConnection,
    owner_id: Uuid,
    kind: WalletKind,
    currency: &str,
) -> Result<WalletEntity, sqlx::Error> {
    let timer = QueryTimer::new("ensure_wallet");
    sqlx::query(
        r#"
        INSERT INTO wallets (owner_id, kind, currency)
        VALUES ($1, $2, $3)
        ON CONFLICT (owner_id, kind) DO NOTHING
        "#,
    )
    .bind(owner_id)
    .bind(kind)
    .bind(currency)
    .execute(&mut *conn)
    .await?;

    let result = sqlx::query_as::<_, WalletEntity>(&format!(
        "SELECT {} FROM wallets WHERE owner_id = $1 AND kind = $2",
        WALLET_COLUMNS
    ))
    .bind(owner_id)
    .bind(kind)
    .fetch_one(&mut *conn)
    .await;
    timer.record();
    result
}

/// Lock wallets in ascending id order so concurrent movers cannot deadlock.
pub async fn lock_wallets(
    conn: &mut PgConnection,
    wallet_ids: &[Uuid],
) -> Result<Vec<WalletEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_wallets");
    let mut ids = wallet_ids.to_vec();
    ids.sort();
    ids.dedup();
    let result = sqlx::query_as::<_, WalletEntity>(&format!(
        "SELECT {} FROM wallets WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        WALLET_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await;
    timer.record();
    result
}

/// Decrement a wallet. Fails with `InsufficientFunds` if the balance would go negative.
pub async fn debit(
    conn: &mut PgConnection,
    wallet_id: Uuid,
    amount: Decimal,
) -> EngineResult<Posting> {
    let timer = QueryTimer::new("wallet_debit");
    let updated = sqlx::query_scalar::<_, Decimal>(
        r#"
        UPDATE wallets
        SET balance = balance - $2, updated_at = NOW()
        WHERE id = $1 AND balance >= $2
        RETURNING balance
        "#,
    )
    .bind(wallet_id)
    .bind(amount)
    .fetch_optional(&mut *conn)
    .await?;
    timer.record();

    if updated.is_some() {
        return Ok(Posting::debit(wallet_id, amount));
    }
    let available = wallet_balance(conn, wallet_id).await?;
    Err(EngineError::InsufficientFunds {
        available,
        required: amount,
    })
}

/// Increment a wallet.
pub async fn credit(
    conn: &mut PgConnection,
    wallet_id: Uuid,
    amount: Decimal,
) -> EngineResult<Posting> {
    let timer = QueryTimer::new("wallet_credit");
    let updated = sqlx::query(
        "UPDATE wallets SET balance = balance + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(wallet_id)
    .bind(amount)
    .execute(&mut *conn)
    .await?;
    timer.record();
    if updated.rows_affected() == 0 {
        return Err(EngineError::WalletMissing);
    }
    Ok(Posting::credit(wallet_id, amount))
}

pub async fn wallet_balance(conn: &mut PgConnection, wallet_id: Uuid) -> EngineResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>("SELECT balance FROM wallets WHERE id = $1")
        .bind(wallet_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(EngineError::WalletMissing)
}

/// Append a ledger entry together with the postings that were applied for it.
pub async fn record_entry(
    conn: &mut PgConnection,
    entry: &NewLedgerEntry,
    postings: &[Posting],
) -> EngineResult<LedgerEntryEntity> {
    let timer = QueryTimer::new("record_ledger_entry");
    let row = sqlx::query_as::<_, LedgerEntryEntity>(&format!(
        r#"
        INSERT INTO transactions (transaction_type, amount, currency, status, payment_method,
            external_reference, initiator_id, recipient_id, group_id, description, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        LEDGER_ENTRY_COLUMNS
    ))
    .bind(entry.transaction_type)
    .bind(entry.amount)
    .bind(&entry.currency)
    .bind(entry.status)
    .bind(entry.payment_method)
    .bind(&entry.external_reference)
    .bind(entry.initiator_id)
    .bind(entry.recipient_id)
    .bind(entry.group_id)
    .bind(&entry.description)
    .bind(&entry.metadata)
    .fetch_one(&mut *conn)
    .await?;
    timer.record();

    attach_postings(conn, row.id, postings).await?;
    Ok(row)
}

/// Write postings for an entry whose funds moved after it was recorded.
pub async fn attach_postings(
    conn: &mut PgConnection,
    transaction_id: Uuid,
    postings: &[Posting],
) -> Result<(), sqlx::Error> {
    for posting in postings {
        sqlx::query(
            "INSERT INTO ledger_postings (transaction_id, wallet_id, delta) VALUES ($1, $2, $3)",
        )
        .bind(transaction_id)
        .bind(posting.wallet_id)
        .bind(posting.delta)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Lock the entry carrying a gateway reference.
pub async fn lock_entry_by_reference(
    conn: &mut PgConnection,
    external_reference: &str,
) -> Result<Option<LedgerEntryEntity>, sqlx::Error> {
    let timer = QueryTimer::new("lock_entry_by_reference");
    let result = sqlx::query_as::<_, LedgerEntryEntity>(&format!(
        "SELECT {} FROM transactions WHERE external_reference = $1 FOR UPDATE",
        LEDGER_ENTRY_COLUMNS
    ))
    .bind(external_reference)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}

/// Settle a pending entry. The status guard makes a second settle a no-op.
pub async fn settle_entry(
    conn: &mut PgConnection,
    id: Uuid,
    status: TransactionStatus,
    metadata: &serde_json::Value,
) -> Result<Option<LedgerEntryEntity>, sqlx::Error> {
    let timer = QueryTimer::new("settle_ledger_entry");
    let result = sqlx::query_as::<_, LedgerEntryEntity>(&format!(
        r#"
        UPDATE transactions
        SET status = $2, metadata = $3, updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING {}
        "#,
        LEDGER_ENTRY_COLUMNS
    ))
    .bind(id)
    .bind(status)
    .bind(metadata)
    .fetch_optional(&mut *conn)
    .await;
    timer.record();
    result
}
