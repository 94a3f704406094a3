//! Share holdings, dividend declaration, approval fan-out and processing.

use domain::models::dividend::{
    fan_out, resolve_amounts, DeclareDividendRequest, DividendDeclaration, DividendPayment,
    DividendProcessingSummary, DividendStatus, SetShareHoldingRequest, ShareHolding, ShareStatus,
};
use domain::models::group::Membership;
use domain::models::wallet::{
    NewLedgerEntry, PaymentMethod, TransactionStatus, TransactionType, WalletKind,
};
use domain::services::{authorization, notification};
use domain::{EngineError, EngineResult};
use persistence::repositories::dividend as dividend_repo;
use persistence::repositories::{group as group_repo, ledger};
use persistence::repositories::{DividendRepository, GroupRepository};
use rust_decimal::Decimal;
use serde_json::json;
use shared::pagination::PageParams;
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::engine::{active_group, membership, EngineContext};
use crate::middleware::metrics::record_dividend_payments_paid;

#[derive(Clone)]
pub struct DividendService {
    ctx: EngineContext,
    dividends: DividendRepository,
    groups: GroupRepository,
}

impl DividendService {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            dividends: DividendRepository::new(ctx.pool.clone()),
            groups: GroupRepository::new(ctx.pool.clone()),
            ctx,
        }
    }

    /// Officer sets a member's share holding.
    pub async fn set_holding(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        user_id: Uuid,
        request: SetShareHoldingRequest,
    ) -> EngineResult<ShareHolding> {
        request.validate()?;

        let holding = self
            .ctx
            .run(|| self.set_holding_once(group_id, member_id, user_id, &request))
            .await?;

        info!(
            group_id = %group_id,
            member_id = %member_id,
            user_id = %user_id,
            shares = holding.shares_owned,
            "Share holding updated"
        );
        Ok(holding)
    }

    async fn set_holding_once(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        user_id: Uuid,
        request: &SetShareHoldingRequest,
    ) -> EngineResult<ShareHolding> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        authorization::require_officer(caller.as_ref())?;
        let member = membership(conn, group_id, member_id).await?;
        authorization::require_active_member(member.as_ref())?;

        let row = dividend_repo::upsert_holding(
            conn,
            group_id,
            member_id,
            request.shares_owned,
            request.status.unwrap_or(ShareStatus::Active),
        )
        .await?;
        self.ctx.commit(uow).await?;
        Ok(ShareHolding::from(row))
    }

    /// Declares a dividend in `draft`. Exactly one of total or per-share is given.
    pub async fn declare(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: DeclareDividendRequest,
    ) -> EngineResult<DividendDeclaration> {
        request.validate()?;

        let declaration = self
            .ctx
            .run(|| self.declare_once(group_id, user_id, &request))
            .await?;

        info!(
            group_id = %group_id,
            declaration_id = %declaration.id,
            user_id = %user_id,
            total = %declaration.total_amount,
            per_share = %declaration.per_share_amount,
            "Dividend declared"
        );
        Ok(declaration)
    }

    async fn declare_once(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: &DeclareDividendRequest,
    ) -> EngineResult<DividendDeclaration> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        authorization::require_loan_approver(caller.as_ref())?;

        let total_shares = dividend_repo::total_active_shares(conn, group_id).await?;
        let (total_amount, per_share_amount) =
            resolve_amounts(request.total_amount, request.per_share_amount, total_shares)?;

        let row = dividend_repo::insert_declaration(
            conn,
            group_id,
            request.dividend_type,
            total_amount,
            per_share_amount,
            request.payment_date,
            user_id,
        )
        .await?;
        self.ctx.commit(uow).await?;
        Ok(DividendDeclaration::from(row))
    }

    /// Moves `draft` to `approved` and writes one pending payment per
    /// shareholder. Approving again re-runs the upsert and adds nothing new.
    pub async fn approve(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<DividendDeclaration> {
        let (declaration, inserted) = self
            .ctx
            .run(|| self.approve_once(declaration_id, user_id))
            .await?;

        info!(
            declaration_id = %declaration.id,
            group_id = %declaration.group_id,
            user_id = %user_id,
            payments_created = inserted,
            "Dividend approved"
        );
        Ok(declaration)
    }

    async fn approve_once(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<(DividendDeclaration, usize)> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let declaration = lock_declaration(conn, declaration_id).await?;
        let caller = membership(conn, declaration.group_id, user_id).await?;
        authorization::require_loan_approver(caller.as_ref())?;

        let declaration = match declaration.status {
            DividendStatus::Draft => {
                declaration.status.transition(DividendStatus::Approved)?;
                DividendDeclaration::from(
                    dividend_repo::set_declaration_status(
                        conn,
                        declaration.id,
                        DividendStatus::Approved,
                        Some(user_id),
                    )
                    .await?,
                )
            }
            DividendStatus::Approved => declaration,
            other => {
                return Err(EngineError::InvalidTransition {
                    from: other.as_str().to_string(),
                    to: DividendStatus::Approved.as_str().to_string(),
                })
            }
        };

        let holdings: Vec<ShareHolding> = dividend_repo::group_holdings(conn, declaration.group_id)
            .await?
            .into_iter()
            .map(ShareHolding::from)
            .collect();

        let mut inserted = 0;
        for (member_id, shares, amount) in fan_out(&holdings, declaration.per_share_amount) {
            if dividend_repo::upsert_payment(
                conn,
                declaration.id,
                member_id,
                shares,
                declaration.per_share_amount,
                amount,
            )
            .await?
            {
                inserted += 1;
            }
        }

        self.ctx.commit(uow).await?;
        Ok((declaration, inserted))
    }

    /// Pays every pending payment in one transaction. Any failure, including
    /// an exhausted group wallet, leaves no payment marked paid.
    pub async fn process(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<DividendProcessingSummary> {
        let summary = self
            .ctx
            .run(|| self.process_once(declaration_id, user_id))
            .await
            .map_err(|err| {
                if matches!(err, EngineError::InsufficientGroupFunds { .. }) {
                    warn!(declaration_id = %declaration_id, error = %err, "Dividend processing aborted");
                }
                err
            })?;

        record_dividend_payments_paid(summary.payments_paid);
        info!(
            declaration_id = %summary.declaration.id,
            group_id = %summary.declaration.group_id,
            user_id = %user_id,
            payments_paid = summary.payments_paid,
            amount_paid = %summary.amount_paid,
            "Dividend processed"
        );
        Ok(summary)
    }

    async fn process_once(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
    ) -> EngineResult<DividendProcessingSummary> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let declaration = lock_declaration(conn, declaration_id).await?;
        let caller = membership(conn, declaration.group_id, user_id).await?;
        authorization::require_loan_approver(caller.as_ref())?;

        if declaration.status == DividendStatus::Paid {
            return Ok(DividendProcessingSummary {
                declaration,
                payments_paid: 0,
                amount_paid: Decimal::ZERO,
            });
        }
        declaration.status.transition(DividendStatus::Processing)?;
        dividend_repo::set_declaration_status(conn, declaration.id, DividendStatus::Processing, None)
            .await?;

        let group = active_group(conn, declaration.group_id).await?;
        let pending: Vec<DividendPayment> =
            dividend_repo::lock_pending_payments(conn, declaration.id)
                .await?
                .into_iter()
                .map(DividendPayment::from)
                .collect();

        let group_wallet =
            ledger::ensure_wallet(conn, group.id, WalletKind::Group, &group.currency).await?;
        let mut notes = Vec::with_capacity(pending.len());
        let mut amount_paid = Decimal::ZERO;

        for payment in &pending {
            let paid = pay_one(
                conn,
                &declaration,
                payment,
                group_wallet.id,
                &group.currency,
                &self.ctx.config.limits.default_currency,
                user_id,
            )
            .await?;
            amount_paid += paid.amount;
            notes.push(notification::dividend_paid(&paid, group.id));
        }

        DividendStatus::Processing.transition(DividendStatus::Paid)?;
        let declaration = DividendDeclaration::from(
            dividend_repo::set_declaration_status(conn, declaration.id, DividendStatus::Paid, None)
                .await?,
        );
        group_repo::mirror_group_funds(conn, group.id).await?;

        self.ctx.notify(&mut uow, notes);
        self.ctx.commit(uow).await?;
        Ok(DividendProcessingSummary {
            declaration,
            payments_paid: pending.len(),
            amount_paid,
        })
    }

    /// Payments under a declaration. Members of the declaring group only.
    pub async fn list_payments(
        &self,
        declaration_id: Uuid,
        user_id: Uuid,
        page: PageParams,
    ) -> EngineResult<(Vec<DividendPayment>, i64)> {
        let declaration = self
            .dividends
            .find_declaration(declaration_id)
            .await?
            .map(DividendDeclaration::from)
            .ok_or(EngineError::DeclarationNotFound)?;
        let caller = self
            .groups
            .find_membership(declaration.group_id, user_id)
            .await?
            .map(Membership::from);
        authorization::require_active_member(caller.as_ref())?;

        let payments = self
            .dividends
            .list_payments(declaration.id, page.limit, page.offset)
            .await?
            .into_iter()
            .map(DividendPayment::from)
            .collect();
        let total = self.dividends.count_payments(declaration.id).await?;
        Ok((payments, total))
    }
}

async fn lock_declaration(
    conn: &mut PgConnection,
    declaration_id: Uuid,
) -> EngineResult<DividendDeclaration> {
    dividend_repo::lock_declaration(conn, declaration_id)
        .await?
        .map(DividendDeclaration::from)
        .ok_or(EngineError::DeclarationNotFound)
}

/// Group wallet to member wallet, one transfer entry, payment marked paid.
async fn pay_one(
    conn: &mut PgConnection,
    declaration: &DividendDeclaration,
    payment: &DividendPayment,
    group_wallet_id: Uuid,
    group_currency: &str,
    personal_currency: &str,
    user_id: Uuid,
) -> EngineResult<DividendPayment> {
    let member_wallet =
        ledger::ensure_wallet(conn, payment.member_id, WalletKind::Personal, personal_currency)
            .await?;
    ledger::lock_wallets(conn, &[group_wallet_id, member_wallet.id]).await?;

    let debit = ledger::debit(conn, group_wallet_id, payment.amount)
        .await
        .map_err(|err| match err {
            EngineError::InsufficientFunds {
                available,
                required,
            } => EngineError::InsufficientGroupFunds {
                available,
                required,
            },
            other => other,
        })?;
    let credit = ledger::credit(conn, member_wallet.id, payment.amount).await?;

    let entry = ledger::record_entry(
        conn,
        &NewLedgerEntry {
            transaction_type: TransactionType::Transfer,
            amount: payment.amount,
            currency: group_currency.to_string(),
            status: TransactionStatus::Completed,
            payment_method: PaymentMethod::InternalWallet,
            external_reference: None,
            initiator_id: user_id,
            recipient_id: Some(payment.member_id),
            group_id: Some(declaration.group_id),
            description: Some("Dividend payment".into()),
            metadata: json!({
                "type": "dividend",
                "declaration_id": declaration.id,
                "payment_id": payment.id,
                "shares": payment.shares,
                "per_share_amount": payment.per_share_amount,
            }),
        },
        &[debit, credit],
    )
    .await?;

    Ok(DividendPayment::from(
        dividend_repo::mark_payment_paid(conn, payment.id, entry.id).await?,
    ))
}
